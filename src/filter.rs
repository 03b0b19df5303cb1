use crate::schema::{get_table, table_names, TableSchema, ALL_TABLES};
use anyhow::{bail, Result};
use tracing::info;

/// Resolves which tables to migrate based on include/exclude filters.
///
/// Unknown names are an error so a typo never silently migrates nothing.
/// The result keeps the canonical table order.
pub fn resolve_tables(
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Vec<&'static TableSchema>> {
    match (include, exclude) {
        (Some(_), Some(_)) => {
            bail!("Cannot use both --include and --exclude at the same time");
        }
        (Some(include_list), None) => {
            check_names(&include_list)?;
            let tables: Vec<_> = ALL_TABLES
                .iter()
                .copied()
                .filter(|t| include_list.iter().any(|name| name == t.name))
                .collect();

            info!(tables = ?names_of(&tables), "including tables");
            Ok(tables)
        }
        (None, Some(exclude_list)) => {
            check_names(&exclude_list)?;
            let tables: Vec<_> = ALL_TABLES
                .iter()
                .copied()
                .filter(|t| !exclude_list.iter().any(|name| name == t.name))
                .collect();

            info!(excluded = ?exclude_list, count = tables.len(), "including tables after exclusions");
            Ok(tables)
        }
        (None, None) => {
            info!(count = ALL_TABLES.len(), "including all tables");
            Ok(ALL_TABLES.to_vec())
        }
    }
}

fn check_names(names: &[String]) -> Result<()> {
    for name in names {
        if get_table(name).is_none() {
            bail!(
                "Unknown table '{}'. Known tables: {}",
                name,
                table_names().join(", ")
            );
        }
    }
    Ok(())
}

fn names_of(tables: &[&TableSchema]) -> Vec<&'static str> {
    tables.iter().map(|t| t.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filter_is_everything() {
        let tables = resolve_tables(None, None).unwrap();
        assert_eq!(tables.len(), ALL_TABLES.len());
    }

    #[test]
    fn test_include_keeps_canonical_order() {
        let tables = resolve_tables(
            Some(vec!["zip_boundaries".into(), "colleges".into()]),
            None,
        )
        .unwrap();
        assert_eq!(names_of(&tables), vec!["colleges", "zip_boundaries"]);
    }

    #[test]
    fn test_exclude() {
        let tables = resolve_tables(None, Some(vec!["zip_boundaries".into()])).unwrap();
        assert!(tables.iter().all(|t| t.name != "zip_boundaries"));
        assert_eq!(tables.len(), ALL_TABLES.len() - 1);
    }

    #[test]
    fn test_unknown_and_conflicting_filters_fail() {
        assert!(resolve_tables(Some(vec!["students".into()]), None).is_err());
        assert!(resolve_tables(Some(vec![]), Some(vec![])).is_err());
    }
}
