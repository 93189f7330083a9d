//! Minimal CSV rendering for the export downloads
//!
//! Header cells are written bare; every data cell is wrapped in double quotes
//! with embedded quotes doubled. Rows are separated by `\n`.

pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render a header and rows into one document
pub fn render<I, R>(header: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut lines = vec![header.join(",")];
    for row in rows {
        let cells: Vec<String> = row.into_iter().map(|cell| quote(&cell)).collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotes_are_doubled() {
        assert_eq!(quote(r#"say "hi""#), r#""say ""hi""""#);
        assert_eq!(quote(""), r#""""#);
    }

    #[test]
    fn test_render() {
        let out = render(
            &["id", "note"],
            vec![
                vec!["1".to_string(), "a, b".to_string()],
                vec!["2".to_string(), "line\nbreak".to_string()],
            ],
        );
        assert_eq!(out, "id,note\n\"1\",\"a, b\"\n\"2\",\"line\nbreak\"");
    }

    #[test]
    fn test_header_only() {
        assert_eq!(render(&["id"], Vec::<Vec<String>>::new()), "id");
    }
}
