//! Query Builder pagination operations

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Set the LIMIT, replacing any previous one
    pub fn limit(mut self, count: u64) -> Self {
        self.limit_count = Some(count);
        self.cache.options.take();
        self
    }

    /// Set the OFFSET, replacing any previous one
    pub fn offset(mut self, count: u64) -> Self {
        self.offset_value = Some(count);
        self.cache.options.take();
        self
    }

    /// Add pagination (LIMIT + OFFSET); pages start at 1 and the offset
    /// saturates at `u64::MAX`
    pub fn paginate(self, per_page: u64, page: u64) -> Self {
        let page = page.max(1);
        self.limit(per_page).offset((page - 1).saturating_mul(per_page))
    }
}
