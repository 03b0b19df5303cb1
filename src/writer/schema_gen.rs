use crate::schema::{Dialect, TableSchema};

/// Generate CREATE TABLE SQL for a table schema.
///
/// MySQL has no `CREATE INDEX IF NOT EXISTS`, so its indexes are declared
/// inline; SQLite gets them from [`generate_indexes`].
pub fn generate_create_table(schema: &TableSchema, dialect: Dialect) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n",
        dialect.quote(schema.name)
    );
    let mut columns = Vec::new();

    for col in schema.columns {
        let sql_type = dialect.column_type(col.col_type);
        let pk = if col.primary_key && !col.is_serial() {
            " PRIMARY KEY"
        } else {
            ""
        };
        let null_constraint = if !col.nullable && !col.primary_key {
            " NOT NULL"
        } else {
            ""
        };

        columns.push(format!(
            "    {} {}{}{}",
            dialect.quote(col.name),
            sql_type,
            pk,
            null_constraint
        ));
    }

    if dialect == Dialect::MySql {
        for index in schema.indexes {
            let cols: Vec<String> = index.columns.iter().map(|c| dialect.quote(c)).collect();
            columns.push(format!(
                "    INDEX {} ({})",
                dialect.quote(&index.name(schema.name)),
                cols.join(", ")
            ));
        }
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Generate CREATE INDEX statements (SQLite only; MySQL indexes are inline)
pub fn generate_indexes(schema: &TableSchema, dialect: Dialect) -> Vec<String> {
    if dialect != Dialect::Sqlite {
        return Vec::new();
    }

    schema
        .indexes
        .iter()
        .map(|index| {
            let cols: Vec<String> = index.columns.iter().map(|c| dialect.quote(c)).collect();
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                dialect.quote(&index.name(schema.name)),
                dialect.quote(schema.name),
                cols.join(", ")
            )
        })
        .collect()
}
