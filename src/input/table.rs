use crate::input::IngestError;

#[derive(Debug, Clone)]
pub struct TableHeader {
    pub columns: Vec<String>,
}

impl TableHeader {
    /// Exact (trimmed) match first, then ASCII case-insensitive.
    pub fn find(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    pub fn require(&self, table: &'static str, name: &str) -> Result<usize, IngestError> {
        self.find(name)
            .ok_or_else(|| IngestError::MissingRequiredColumn {
                table,
                column: name.to_string(),
            })
    }

    /// Optional column: absent configuration or absent header both yield `None`.
    pub fn optional(&self, table: &'static str, name: Option<&str>) -> Option<usize> {
        let name = name?;
        let idx = self.find(name);
        if idx.is_none() {
            tracing::warn!(table, column = name, "configured column not found; ignoring");
        }
        idx
    }
}

/// Tab-separated text: first non-empty line is the header.
pub struct DelimitedTable<'a> {
    pub header: TableHeader,
    body: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> DelimitedTable<'a> {
    pub fn parse(text: &'a str) -> Option<Self> {
        let mut body = text.lines().enumerate();
        let header_line = loop {
            let (_, line) = body.next()?;
            let line = line.trim_start_matches('\u{feff}');
            if !line.trim().is_empty() {
                break line;
            }
        };
        let columns = header_line
            .split('\t')
            .map(|s| s.trim().to_string())
            .collect();
        Some(Self {
            header: TableHeader { columns },
            body,
        })
    }
}

impl<'a> Iterator for DelimitedTable<'a> {
    /// 1-based line number and the row's fields.
    type Item = (usize, Vec<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (idx, line) = self.body.next()?;
            if line.trim().is_empty() {
                continue;
            }
            return Some((idx + 1, line.split('\t').collect()));
        }
    }
}

/// Finite float, or `None` for empty and non-numeric cells.
pub fn parse_number(cell: Option<&str>) -> Option<f64> {
    let value = cell?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn non_empty(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim).filter(|s| !s.is_empty())
}
