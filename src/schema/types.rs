/// Column data type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnType {
    /// Auto-assigned integer primary key
    Serial,
    Integer,
    Real,
    /// Short text; the length only matters for engines that need VARCHAR sizes
    Text(u16),
    /// Unbounded text such as serialized geometry
    LongText,
}

/// SQL engine a statement is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    MySql,
}

impl Dialect {
    /// Quote an identifier for this engine
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    pub fn column_type(&self, col_type: ColumnType) -> String {
        match (self, col_type) {
            (Dialect::Sqlite, ColumnType::Serial) => "INTEGER PRIMARY KEY AUTOINCREMENT".into(),
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER".into(),
            (Dialect::Sqlite, ColumnType::Real) => "REAL".into(),
            (Dialect::Sqlite, ColumnType::Text(_)) => "TEXT".into(),
            (Dialect::Sqlite, ColumnType::LongText) => "TEXT".into(),
            (Dialect::MySql, ColumnType::Serial) => "BIGINT AUTO_INCREMENT PRIMARY KEY".into(),
            (Dialect::MySql, ColumnType::Integer) => "BIGINT".into(),
            (Dialect::MySql, ColumnType::Real) => "DOUBLE".into(),
            (Dialect::MySql, ColumnType::Text(len)) => format!("VARCHAR({})", len),
            (Dialect::MySql, ColumnType::LongText) => "LONGTEXT".into(),
        }
    }
}

/// Column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl Column {
    /// Create an optional (nullable) column
    pub const fn new(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
            primary_key: false,
        }
    }

    /// Create the natural primary key column
    pub const fn key(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
            primary_key: true,
        }
    }

    /// Create an auto-assigned id column
    pub const fn serial(name: &'static str) -> Self {
        Self {
            name,
            col_type: ColumnType::Serial,
            nullable: false,
            primary_key: true,
        }
    }

    pub fn is_serial(&self) -> bool {
        self.col_type == ColumnType::Serial
    }
}

/// Index definition
#[derive(Debug, Clone)]
pub struct Index {
    pub columns: &'static [&'static str],
}

impl Index {
    pub const fn on(columns: &'static [&'static str]) -> Self {
        Self { columns }
    }

    pub fn name(&self, table: &str) -> String {
        format!("idx_{}_{}", table, self.columns.join("_"))
    }
}

/// Table schema definition
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indexes: &'static [Index],
}

impl TableSchema {
    /// The primary key column
    pub fn key_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Columns a loader supplies values for (everything but serial ids)
    pub fn insert_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| !c.is_serial())
            .map(|c| c.name)
            .collect()
    }

    /// Column by name, ignoring ASCII case
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
