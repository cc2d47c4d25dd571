//! Read-only view over the persisted connectivity files.

use std::path::Path;

use glacier_error::Result;
use glacier_store::{FileMap, MetaView, le_u32_values};

/// Mmapped `connmeta`/`conndata`/`toplevel`.
#[derive(Debug)]
pub struct ConnectivityView {
    conn: MetaView<u32>,
    toplevel: FileMap<u32>,
}

/// Field offsets inside a connectivity record.
const EPOCH: usize = 0;
const PARENT: usize = 4;
const CHILDTOTAL: usize = 8;
const CHILDCOUNT: usize = 12;
const CHILDREN: usize = 16;

impl ConnectivityView {
    /// Open the three files under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let conn = MetaView::open(dir.join("connmeta"), dir.join("conndata"))?;
        let toplevel = FileMap::open(dir.join("toplevel"))?;
        Ok(Self { conn, toplevel })
    }

    /// Number of messages covered.
    #[must_use]
    pub fn size(&self) -> usize {
        self.conn.size()
    }

    fn field(&self, idx: u32, at: usize) -> u32 {
        let record = self.conn.record(idx as usize);
        u32::from_le_bytes(record[at..at + 4].try_into().expect("slice of 4"))
    }

    /// Unix seconds of message `idx`; 0 = unparsable date.
    #[must_use]
    pub fn epoch(&self, idx: u32) -> u32 {
        self.field(idx, EPOCH)
    }

    /// Parent of `idx`, -1 for roots.
    #[must_use]
    pub fn parent(&self, idx: u32) -> i32 {
        self.field(idx, PARENT) as i32
    }

    /// Transitive descendant count of `idx`.
    #[must_use]
    pub fn total_children(&self, idx: u32) -> u32 {
        self.field(idx, CHILDTOTAL)
    }

    /// Direct child count of `idx`.
    #[must_use]
    pub fn child_count(&self, idx: u32) -> u32 {
        self.field(idx, CHILDCOUNT)
    }

    /// Direct children of `idx`, sorted by epoch ascending.
    pub fn children(&self, idx: u32) -> impl Iterator<Item = u32> + '_ {
        let count = self.child_count(idx) as usize;
        let record = self.conn.record(idx as usize);
        le_u32_values(&record[CHILDREN..CHILDREN + count * 4])
    }

    /// Root message indices, in stored order.
    pub fn toplevel(&self) -> impl Iterator<Item = u32> + '_ {
        self.toplevel.iter()
    }

    /// Number of toplevel messages.
    #[must_use]
    pub fn toplevel_count(&self) -> usize {
        self.toplevel.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ConnNode, ConnectivityTable};

    #[test]
    fn view_reads_what_table_wrote() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut table = ConnectivityTable::with_size(3);
        table.nodes[0] = ConnNode {
            epoch: 10,
            parent: -1,
            childtotal: 2,
            children: vec![1, 2],
        };
        table.nodes[1] = ConnNode {
            epoch: 20,
            parent: 0,
            childtotal: 0,
            children: vec![],
        };
        table.nodes[2] = ConnNode {
            epoch: 30,
            parent: 0,
            childtotal: 0,
            children: vec![],
        };
        table.toplevel = vec![0];
        table.save(dir.path()).expect("save");

        let view = ConnectivityView::open(dir.path()).expect("open");
        assert_eq!(view.size(), 3);
        assert_eq!(view.epoch(0), 10);
        assert_eq!(view.parent(0), -1);
        assert_eq!(view.parent(2), 0);
        assert_eq!(view.total_children(0), 2);
        assert_eq!(view.children(0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(view.children(1).count(), 0);
        assert_eq!(view.toplevel().collect::<Vec<_>>(), vec![0]);
    }
}
