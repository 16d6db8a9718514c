//! MySQL partition backend implementation
//!
//! Monthly report partitions live in one MySQL schema. Rows are written
//! with multi-row `INSERT` statements; partitions are plain tables created
//! from a fixed DDL on first use and dropped by retention pruning.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, QueryBuilder, Row};
use tracing::{debug, info, instrument};

use super::backend::PartitionBackend;
use super::error::{StorageError, StorageResult};
use super::schema::{REPORT_COLUMNS, ReportRow};

/// MySQL partition backend
pub struct MySqlBackend {
    pool: MySqlPool,
}

impl MySqlBackend {
    /// Connect a new pool. Fails fast when the server is unreachable;
    /// callers treat this as a fatal startup error.
    #[instrument(skip_all)]
    pub async fn connect(url: &str, max_connections: u32) -> StorageResult<Self> {
        info!("connecting MySQL pool ({max_connections} connections)");

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Share an already-connected pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PartitionBackend for MySqlBackend {
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_rows(&self, table: &str, rows: &[ReportRow]) -> StorageResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "INSERT INTO `{}` (`{}`) ",
            table,
            REPORT_COLUMNS.join("`,`")
        ));

        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.job_id)
                .push_bind(&row.service_name)
                .push_bind(row.status)
                .push_bind(row.env_type)
                .push_bind(row.start_time)
                .push_bind(row.stop_time)
                .push_bind(row.heart_time)
                .push_bind(row.exit_code)
                .push_bind(&row.host)
                .push_bind(row.process_id)
                .push_bind(row.memory)
                .push_bind(row.load)
                .push_bind(row.net_in)
                .push_bind(row.net_out)
                .push_bind(&row.extend)
                .push_bind(row.is_alarm)
                .push_bind(row.create_time);
        });

        let result = builder.build().execute(&self.pool).await?;

        debug!("inserted {} rows into {table}", rows.len());
        Ok(result.last_insert_id())
    }

    #[instrument(skip(self))]
    async fn create_report_table(&self, table: &str) -> StorageResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS `{table}` ( \
             `id` bigint NOT NULL AUTO_INCREMENT, \
             `job_id` bigint DEFAULT '0', \
             `service_name` varchar(127) DEFAULT '', \
             `status` tinyint DEFAULT '1', \
             `env_type` tinyint DEFAULT '0', \
             `start_time` bigint DEFAULT '0', \
             `stop_time` bigint DEFAULT '0', \
             `heart_time` bigint DEFAULT '0', \
             `exit_code` tinyint DEFAULT '0', \
             `host` varchar(32) DEFAULT '', \
             `process_id` bigint DEFAULT '0', \
             `memory` int DEFAULT '0', \
             `load` int DEFAULT '0', \
             `net_in` bigint DEFAULT '0', \
             `net_out` bigint DEFAULT '0', \
             `extend` text, \
             `is_alarm` tinyint(1) DEFAULT '0', \
             `create_time` bigint DEFAULT '0', \
             PRIMARY KEY (`id`), \
             KEY `idx_job_id` (`job_id`) USING BTREE, \
             KEY `idx_service_name` (`service_name`) USING BTREE, \
             KEY `idx_status` (`status`) USING BTREE, \
             KEY `idx_memory` (`memory`) USING BTREE \
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );

        sqlx::query(&ddl).execute(&self.pool).await?;

        info!("created report partition {table}");
        Ok(())
    }

    async fn list_tables(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // SHOW TABLES does not accept placeholders; the prefix is a
        // compile-time constant in practice.
        let rows = sqlx::query(&format!("SHOW TABLES LIKE '{prefix}%'"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>(0).map_err(StorageError::from))
            .collect()
    }

    #[instrument(skip(self))]
    async fn drop_table(&self, table: &str) -> StorageResult<()> {
        sqlx::query(&format!("DROP TABLE `{table}`"))
            .execute(&self.pool)
            .await?;

        info!("dropped expired report partition {table}");
        Ok(())
    }
}
