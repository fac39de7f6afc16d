use scraper::{ElementRef, Html, Selector};

/// One `<tr>` of a scoring page table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    cells: Vec<String>,
    header: bool,
}

impl Row {
    pub fn new(cells: Vec<String>, header: bool) -> Self {
        Self { cells, header }
    }

    /// True when the row contains any `<th>` cell.
    pub fn is_header(&self) -> bool {
        self.header
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Trimmed text of the cell at `index`, counting from the left.
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }

    /// Trimmed text of the cell `offset` places from the right; `1` is the last cell.
    pub fn cell_from_end(&self, offset: usize) -> Option<&str> {
        if offset == 0 || offset > self.cells.len() {
            return None;
        }
        self.cell(self.cells.len() - offset)
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// Extracts every table row of a page, in document order.
///
/// Only direct `td`/`th` children count as cells. Cell text is whitespace-trimmed,
/// so a cell holding just `&nbsp;` comes back empty.
pub fn extract_rows(html: &str) -> Vec<Row> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("tr").unwrap();

    document
        .select(&row_selector)
        .map(|row| {
            let mut header = false;
            let cells = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| {
                    let name = cell.value().name();
                    if name == "th" {
                        header = true;
                    }
                    name == "td" || name == "th"
                })
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect();
            Row::new(cells, header)
        })
        .collect()
}
