//! Table recovery from positioned page content.
//!
//! Two strategies, tried in order by the reader:
//! - **Ruled**: horizontal and vertical ruling segments drawn on the page
//!   define a cell grid; text runs are dropped into the cell that contains
//!   their origin.
//! - **Text-aligned**: lines with several separated runs are stacked into
//!   blocks and column boundaries are derived from aligned run origins.

/// A piece of text shown on the page, origin in user space (y grows upward).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    /// Approximate advance width of the run.
    pub width: f64,
    pub text: String,
}

/// A straight stroke or rectangle edge in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub runs: Vec<TextRun>,
    pub segments: Vec<Segment>,
}

/// Row-major grid of cell strings. Empty cells are empty strings.
pub type Table = Vec<Vec<String>>;

/// Coordinates closer than this are the same line.
const SNAP: f64 = 2.0;
/// Segments shorter than this are ignored as ruling edges.
const MIN_EDGE: f64 = 5.0;
/// Run origins within this distance share a text column.
const COLUMN_SNAP: f64 = 8.0;
/// Gap between runs, in points, still treated as the same cell.
const WORD_GAP: f64 = 3.0;

impl Segment {
    fn is_horizontal(&self) -> bool {
        (self.y1 - self.y2).abs() <= SNAP && (self.x1 - self.x2).abs() >= MIN_EDGE
    }

    fn is_vertical(&self) -> bool {
        (self.x1 - self.x2).abs() <= SNAP && (self.y1 - self.y2).abs() >= MIN_EDGE
    }

    fn bbox(&self) -> (f64, f64, f64, f64) {
        (
            self.x1.min(self.x2),
            self.y1.min(self.y2),
            self.x1.max(self.x2),
            self.y1.max(self.y2),
        )
    }

    fn touches(&self, other: &Segment) -> bool {
        let (ax0, ay0, ax1, ay1) = self.bbox();
        let (bx0, by0, bx1, by1) = other.bbox();
        ax0 <= bx1 + SNAP && bx0 <= ax1 + SNAP && ay0 <= by1 + SNAP && by0 <= ay1 + SNAP
    }
}

/// Merge sorted values that lie within `tol` of their neighbour.
fn cluster(mut values: Vec<f64>, tol: f64) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    let mut groups: Vec<Vec<f64>> = Vec::new();
    for v in values {
        match groups.last_mut() {
            Some(g) if g.last().is_some_and(|last| v - last <= tol) => g.push(v),
            _ => groups.push(vec![v]),
        }
    }
    groups
        .into_iter()
        .map(|g| g.iter().sum::<f64>() / g.len() as f64)
        .collect()
}

// ---------------------------------------------------------------------------
// Ruled strategy
// ---------------------------------------------------------------------------

/// Tables defined by ruling lines, one per connected group of edges.
pub fn find_ruled_tables(layout: &PageLayout) -> Vec<Table> {
    let edges: Vec<Segment> = layout
        .segments
        .iter()
        .copied()
        .filter(|s| s.is_horizontal() || s.is_vertical())
        .collect();

    let mut tables = Vec::new();
    for group in connected_groups(&edges) {
        let ys = cluster(
            group
                .iter()
                .filter(|s| s.is_horizontal())
                .map(|s| (s.y1 + s.y2) / 2.0)
                .collect(),
            SNAP,
        );
        let xs = cluster(
            group
                .iter()
                .filter(|s| s.is_vertical())
                .map(|s| (s.x1 + s.x2) / 2.0)
                .collect(),
            SNAP,
        );
        if ys.len() < 2 || xs.len() < 2 {
            continue;
        }
        if let Some(table) = fill_grid(&layout.runs, &xs, &ys) {
            tables.push(table);
        }
    }
    tables
}

fn connected_groups(edges: &[Segment]) -> Vec<Vec<Segment>> {
    let mut parent: Vec<usize> = (0..edges.len()).collect();

    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            if edges[i].touches(&edges[j]) {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<Segment>)> = Vec::new();
    for (i, edge) in edges.iter().enumerate() {
        let r = root(&mut parent, i);
        match groups.iter_mut().find(|(id, _)| *id == r) {
            Some((_, g)) => g.push(*edge),
            None => groups.push((r, vec![*edge])),
        }
    }
    groups.into_iter().map(|(_, g)| g).collect()
}

/// `xs` ascending, `ys` ascending; rows are emitted top to bottom.
fn fill_grid(runs: &[TextRun], xs: &[f64], ys: &[f64]) -> Option<Table> {
    let n_cols = xs.len() - 1;
    let n_rows = ys.len() - 1;
    let mut cells: Vec<Vec<Vec<&TextRun>>> = vec![vec![Vec::new(); n_cols]; n_rows];

    for run in runs {
        let Some(col) = xs
            .windows(2)
            .position(|w| run.x >= w[0] - SNAP && run.x < w[1])
        else {
            continue;
        };
        // Row 0 is the top band, i.e. the highest pair of y values.
        let Some(band) = ys
            .windows(2)
            .position(|w| run.y > w[0] && run.y <= w[1] + SNAP)
        else {
            continue;
        };
        cells[n_rows - 1 - band][col].push(run);
    }

    let table: Table = cells
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect::<Vec<String>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    if table.is_empty() { None } else { Some(table) }
}

/// Runs on the same baseline joined by spaces; baselines joined by newlines.
fn cell_text(mut runs: Vec<&TextRun>) -> String {
    runs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
    let mut lines: Vec<(f64, Vec<&str>)> = Vec::new();
    for run in runs {
        let text = run.text.trim();
        if text.is_empty() {
            continue;
        }
        match lines.last_mut() {
            Some((y, parts)) if (*y - run.y).abs() <= SNAP => parts.push(text),
            _ => lines.push((run.y, vec![text])),
        }
    }
    lines
        .into_iter()
        .map(|(_, parts)| parts.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Text-aligned strategy
// ---------------------------------------------------------------------------

/// Tables inferred from runs aligned into columns, for pages without rulings.
pub fn find_text_tables(layout: &PageLayout) -> Vec<Table> {
    let lines = group_lines(&layout.runs);

    let mut tables = Vec::new();
    let mut block: Vec<&Vec<TextRun>> = Vec::new();
    for line in &lines {
        if line.len() >= 3 {
            block.push(line);
            continue;
        }
        if block.len() >= 2 {
            tables.push(block_to_table(&block));
        }
        block.clear();
    }
    if block.len() >= 2 {
        tables.push(block_to_table(&block));
    }
    tables
}

/// Group runs into baselines (top to bottom), merging runs that abut.
fn group_lines(runs: &[TextRun]) -> Vec<Vec<TextRun>> {
    let mut sorted: Vec<&TextRun> = runs.iter().filter(|r| !r.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Vec<TextRun>> = Vec::new();
    for run in sorted {
        match lines.last_mut() {
            Some(line) if line.first().is_some_and(|f| (f.y - run.y).abs() <= SNAP) => {
                line.push(run.clone())
            }
            _ => lines.push(vec![run.clone()]),
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            let mut merged: Vec<TextRun> = Vec::new();
            for run in line {
                match merged.last_mut() {
                    Some(prev) if run.x - (prev.x + prev.width) <= WORD_GAP => {
                        prev.text.push(' ');
                        prev.text.push_str(run.text.trim());
                        prev.width = (run.x + run.width) - prev.x;
                    }
                    _ => merged.push(TextRun {
                        text: run.text.trim().to_string(),
                        ..run
                    }),
                }
            }
            merged
        })
        .collect()
}

fn block_to_table(block: &[&Vec<TextRun>]) -> Table {
    let starts = cluster(
        block.iter().flat_map(|line| line.iter().map(|r| r.x)).collect(),
        COLUMN_SNAP,
    );
    block
        .iter()
        .map(|line| {
            let mut row = vec![String::new(); starts.len()];
            for run in line.iter() {
                let col = starts
                    .iter()
                    .rposition(|s| *s <= run.x + COLUMN_SNAP)
                    .unwrap_or(0);
                if !row[col].is_empty() {
                    row[col].push(' ');
                }
                row[col].push_str(&run.text);
            }
            row
        })
        .collect()
}
