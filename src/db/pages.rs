use crate::db::tables::PAGES;
use crate::db::{Database, DbError, DbResult};

impl Database {
    pub fn get_page(&self, title: &str) -> DbResult<Vec<u8>> {
        self.read(|txn| {
            let pages = txn.open_table(PAGES)?;
            let body = pages.get(title)?;
            body.map(|b| b.value().to_vec())
                .ok_or_else(|| DbError::NotFound(format!("page '{}'", title)))
        })
    }

    /// Last write wins.
    pub fn save_page(&self, title: &str, body: &[u8]) -> DbResult<()> {
        self.write(|txn| {
            let mut pages = txn.open_table(PAGES)?;
            pages.insert(title, body)?;
            Ok(())
        })
    }
}
