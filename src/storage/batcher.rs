use crate::core::types::Id;

/// Placeholder in a statement template replaced by `(?,?,...)`
pub const IN_PLACEHOLDER: &str = "#IN#";

/// Satisfies a variable-count lookup with a fixed menu of prepared statement sizes.
///
/// For `n` remaining ids the largest size `<= n` is drawn, so a fill costs one round
/// trip per size touched instead of one per id or one unbounded `IN` list.
#[derive(Debug, Clone)]
pub struct Batcher {
    sizes: Vec<usize>,
    statements: Vec<String>,
}

/// One draw from the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    pub statement: &'a str,
    pub size: usize,
    pub ids: &'a [Id],
}

/// Iterator over the draws needed for one set of ids
pub struct BatchQuery<'a> {
    batcher: &'a Batcher,
    remaining: &'a [Id],
}

impl Batcher {
    /// Sizes are sorted descending and deduplicated; a size of 1 is always present
    pub fn new(template: &str, sizes: &[usize]) -> Self {
        let mut sizes: Vec<usize> = sizes.iter().copied().filter(|s| *s > 0).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes.dedup();
        if sizes.last() != Some(&1) {
            sizes.push(1);
        }

        let statements = sizes
            .iter()
            .map(|size| {
                let placeholders = vec!["?"; *size].join(",");
                template.replacen(IN_PLACEHOLDER, &format!("({})", placeholders), 1)
            })
            .collect();

        Batcher { sizes, statements }
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn query<'a>(&'a self, ids: &'a [Id]) -> BatchQuery<'a> {
        BatchQuery {
            batcher: self,
            remaining: ids,
        }
    }
}

impl<'a> Iterator for BatchQuery<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Batch<'a>> {
        let left = self.remaining.len();
        if left == 0 {
            return None;
        }
        // The menu always ends with 1, so some size fits
        let index = self.batcher.sizes.iter().position(|size| *size <= left)?;
        let size = self.batcher.sizes[index];
        let (ids, rest) = self.remaining.split_at(size);
        self.remaining = rest;
        Some(Batch {
            statement: &self.batcher.statements[index],
            size,
            ids,
        })
    }
}
