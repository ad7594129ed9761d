//! Columnar store of drained hits awaiting output.

/// Parallel columns of `(template_id, position, encoded_read_id, reverse)`.
///
/// Appending never checks order; [`ResultSet::sort`] reorders by
/// `(template_id, position)` and may be called repeatedly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    template_ids: Vec<i64>,
    positions: Vec<i32>,
    encoded_read_ids: Vec<i32>,
    reverse: Vec<bool>,
}

impl ResultSet {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty result set with room for `capacity` results.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            template_ids: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            encoded_read_ids: Vec::with_capacity(capacity),
            reverse: Vec::with_capacity(capacity),
        }
    }

    /// Appends one result.
    pub fn append(&mut self, template_id: i64, position: i32, encoded_read_id: i32, reverse: bool) {
        self.template_ids.push(template_id);
        self.positions.push(position);
        self.encoded_read_ids.push(encoded_read_id);
        self.reverse.push(reverse);
    }

    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.template_ids.len()
    }

    /// Whether there are no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.template_ids.is_empty()
    }

    /// Template id of result `i`.
    #[must_use]
    pub fn template_id(&self, i: usize) -> i64 {
        self.template_ids[i]
    }

    /// Position of result `i`.
    #[must_use]
    pub fn position(&self, i: usize) -> i32 {
        self.positions[i]
    }

    /// Encoded read id of result `i`.
    #[must_use]
    pub fn encoded_read_id(&self, i: usize) -> i32 {
        self.encoded_read_ids[i]
    }

    /// Reverse flag of result `i`.
    #[must_use]
    pub fn reverse(&self, i: usize) -> bool {
        self.reverse[i]
    }

    /// Sort key of result `i`.
    #[must_use]
    pub fn coordinate(&self, i: usize) -> (i64, i64) {
        (self.template_ids[i], i64::from(self.positions[i]))
    }

    /// Stable sort by `(template_id, position)`.
    pub fn sort(&mut self) {
        if self.is_sorted() {
            return;
        }
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| (self.template_ids[i], self.positions[i]));

        self.template_ids = order.iter().map(|&i| self.template_ids[i]).collect();
        self.positions = order.iter().map(|&i| self.positions[i]).collect();
        self.encoded_read_ids = order.iter().map(|&i| self.encoded_read_ids[i]).collect();
        self.reverse = order.iter().map(|&i| self.reverse[i]).collect();
    }

    /// Whether results are in `(template_id, position)` order.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        (1..self.len()).all(|i| self.coordinate(i - 1) <= self.coordinate(i))
    }

    /// Iterates results as `(template_id, position, encoded_read_id, reverse)`.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i32, i32, bool)> + '_ {
        (0..self.len()).map(|i| {
            (self.template_ids[i], self.positions[i], self.encoded_read_ids[i], self.reverse[i])
        })
    }
}
