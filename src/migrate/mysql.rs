use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, QueryBuilder};
use tracing::info;

use super::destination::{Destination, InsertError};
use crate::parser::{Row, SqlValue};
use crate::schema::{Dialect, TableSchema};
use crate::writer::generate_create_table;

/// ER_NET_PACKET_TOO_LARGE, ER_TOO_BIG_FOR_UNCOMPRESS, ER_DATA_TOO_LONG
const PAYLOAD_ERROR_NUMBERS: [u16; 3] = [1153, 1301, 1406];

#[derive(Debug, Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl MySqlConfig {
    fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }
}

pub struct MySqlDestination {
    pool: MySqlPool,
}

impl MySqlDestination {
    pub async fn connect(config: &MySqlConfig) -> anyhow::Result<Self> {
        info!(
            host = %config.host,
            port = config.port,
            user = %config.user,
            database = %config.database,
            "connecting to MySQL"
        );

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(config.connect_options())
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Destination for MySqlDestination {
    fn name(&self) -> &str {
        "mysql"
    }

    async fn ensure_table(&mut self, schema: &TableSchema) -> Result<(), InsertError> {
        let sql = generate_create_table(schema, Dialect::MySql);
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| InsertError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        schema: &TableSchema,
        columns: &[&str],
        rows: &[Row],
    ) -> Result<(), InsertError> {
        if rows.is_empty() {
            return Ok(());
        }

        let quoted: Vec<String> = columns.iter().map(|c| Dialect::MySql.quote(c)).collect();
        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            Dialect::MySql.quote(schema.name),
            quoted.join(", ")
        ));

        builder.push_values(rows, |mut b, row| {
            for value in row {
                match value {
                    SqlValue::Null => b.push_bind(None::<String>),
                    SqlValue::Integer(i) => b.push_bind(*i),
                    SqlValue::Real(f) => b.push_bind(*f),
                    SqlValue::Text(s) => b.push_bind(s.clone()),
                };
            }
        });

        // A single multi-row statement is atomic on its own
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(classify_mysql)?;
        Ok(())
    }
}

fn classify_mysql(e: sqlx::Error) -> InsertError {
    let Some(db_err) = e.as_database_error() else {
        return InsertError::Fatal(e.to_string());
    };

    if db_err.is_unique_violation() || db_err.is_check_violation() {
        return InsertError::Constraint(e.to_string());
    }

    let number = db_err
        .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
        .map(|my| my.number());
    match number {
        Some(n) if PAYLOAD_ERROR_NUMBERS.contains(&n) => InsertError::PayloadTooLarge(e.to_string()),
        _ => InsertError::Fatal(e.to_string()),
    }
}
