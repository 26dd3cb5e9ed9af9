/// Plain-text table with a boxed header, one row per line.
///
/// ```text
/// +-------+--------+------+
/// | Name  | Amount | Unit |
/// +-------+--------+------+
/// | flour | 150    | g    |
/// +-------+--------+------+
/// ```
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: vec![],
        }
    }

    /// Missing cells render empty, extra cells are dropped.
    pub fn add_row(&mut self, row: Vec<String>) {
        let mut row = row;
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn separator(widths: &[usize]) -> String {
        widths.iter().fold(String::from("+"), |mut s, w| {
            s += &"-".repeat(w + 2);
            s += "+";
            s
        })
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        cells
            .iter()
            .zip(widths)
            .fold(String::from("|"), |mut s, (cell, w)| {
                let pad = w - cell.chars().count();
                s += &format!(" {cell}{} |", " ".repeat(pad));
                s
            })
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let separator = Self::separator(&widths);

        let mut lines = vec![
            separator.clone(),
            Self::line(&self.headers, &widths),
            separator.clone(),
        ];
        lines.extend(self.rows.iter().map(|row| Self::line(row, &widths)));
        if !self.rows.is_empty() {
            lines.push(separator);
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_padded_to_the_widest_cell() {
        let mut table = TextTable::new(&["Name", "Amount", "Unit"]);
        table.add_row(vec!["flour".into(), "150".into(), "g".into()]);
        table.add_row(vec!["сахар".into(), "5".into(), "g".into()]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "+-------+--------+------+");
        assert_eq!(lines[1], "| Name  | Amount | Unit |");
        assert_eq!(lines[3], "| flour | 150    | g    |");
        assert_eq!(lines[4], "| сахар | 5      | g    |");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn empty_table_renders_only_the_header() {
        let table = TextTable::new(&["Name", "Amount", "Unit"]);

        assert_eq!(table.render().lines().count(), 3);
    }
}
