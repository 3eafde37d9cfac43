//! Clipboard/export formats for analysis results

/// Quote a text field, doubling embedded quotes
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render a ref-labelled matrix as CSV.
///
/// Ref names are always quoted; cells are bare numbers. Rows are joined with
/// `\n` and there is no trailing newline.
pub fn matrix_to_csv(refs: &[String], matrix: &[Vec<u64>]) -> String {
    let header = std::iter::once(quote("ref"))
        .chain(refs.iter().map(|r| quote(r)))
        .collect::<Vec<_>>()
        .join(",");

    let rows = refs.iter().enumerate().map(|(i, r)| {
        let cells = matrix.get(i).map(Vec::as_slice).unwrap_or(&[]);
        std::iter::once(quote(r))
            .chain(cells.iter().map(u64::to_string))
            .collect::<Vec<_>>()
            .join(",")
    });

    std::iter::once(header)
        .chain(rows)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Space-separated order, ready to paste into a merge script
pub fn order_to_line(order: &[String]) -> String {
    order.join(" ")
}
