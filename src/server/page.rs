//! The single HTML page hosting the map front end

use super::store::BucketLists;

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Colleges by ZIP Demographics</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
  <link rel="stylesheet" href="https://cdn.datatables.net/1.13.6/css/jquery.dataTables.min.css">
  <style>
    body { font-family: sans-serif; margin: 0; display: flex; }
    #filters { width: 240px; padding: 12px; overflow-y: auto; height: 100vh; box-sizing: border-box; }
    #content { flex: 1; }
    #map { height: 60vh; }
    #tableWrap { padding: 12px; }
  </style>
</head>
<body>
"#;

const TAIL: &str = r#"<div id="content">
  <div id="map"></div>
  <div id="tableWrap">
    <table id="collegeTable" class="display" style="width:100%">
      <thead><tr>
        <th>Name</th><th>Address</th><th>City</th><th>State</th><th>ZIP</th>
        <th>Telephone</th><th>Population</th><th>County</th><th>County FIPS</th>
        <th>Website</th><th>Income</th><th>Population Bucket</th>
      </tr></thead>
    </table>
  </div>
</div>
<script src="https://code.jquery.com/jquery-3.7.1.min.js"></script>
<script src="https://cdn.datatables.net/1.13.6/js/jquery.dataTables.min.js"></script>
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script src="/static/js/map.js"></script>
</body>
</html>
"#;

/// Render the index page with one checkbox per bucket
pub fn render_index(lists: &BucketLists) -> String {
    let mut html = String::from(HEAD);
    html.push_str("<div id=\"filters\">\n");

    section(
        &mut html,
        "Median Household Income",
        "income",
        lists.income_buckets.iter().map(|b| b.label()),
    );
    section(
        &mut html,
        "Population",
        "population",
        lists.population_buckets.iter().map(|b| b.label()),
    );
    section(&mut html, "Show", "business", ["colleges"]);

    html.push_str("</div>\n");
    html.push_str(TAIL);
    html
}

fn section<'a>(
    html: &mut String,
    title: &str,
    filter_type: &str,
    values: impl IntoIterator<Item = &'a str>,
) {
    html.push_str(&format!("  <h3>{}</h3>\n", escape(title)));
    for value in values {
        let value = escape(value);
        html.push_str(&format!(
            "  <label><input type=\"checkbox\" class=\"filter-checkbox\" \
             data-filter-type=\"{filter_type}\" value=\"{value}\" checked> {value}</label><br>\n"
        ));
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{IncomeBucket, PopulationBucket};

    #[test]
    fn test_checkboxes_follow_list_order() {
        let lists = BucketLists {
            income_buckets: vec![IncomeBucket::From100kTo125k, IncomeBucket::Over250k],
            population_buckets: vec![PopulationBucket::Under1k, PopulationBucket::Unknown],
        };
        let html = render_index(&lists);

        let first = html.find("value=\"$100k-$125k\"").unwrap();
        let last = html.find("value=\"$250k+\"").unwrap();
        assert!(first < last);
        assert!(html.contains("data-filter-type=\"population\" value=\"Unknown\""));
        assert!(html.contains("data-filter-type=\"business\" value=\"colleges\""));
        assert!(!html.contains("Under $100k"));

        // One checkbox per line
        let boxes: Vec<&str> = html.lines().filter(|l| l.contains("<input")).collect();
        assert_eq!(boxes.len(), 5);
        assert!(boxes.iter().all(|l| l.trim_end().ends_with("<br>")));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }
}
