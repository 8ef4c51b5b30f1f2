// Metric categories and the store tags they persist under

use std::fmt;

/// One metric domain, collected and stored independently.
///
/// Variant order is the evaluation order of a collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Cpu,
    Memory,
    Disk,
    WebServer,
    DatabaseEngine,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Cpu,
        Category::Memory,
        Category::Disk,
        Category::WebServer,
        Category::DatabaseEngine,
    ];

    /// Human-readable label used in log lines ("Read Failed - Memory").
    pub fn label(self) -> &'static str {
        match self {
            Category::Cpu => "CPU",
            Category::Memory => "Memory",
            Category::Disk => "Disk",
            Category::WebServer => "Web Server",
            Category::DatabaseEngine => "SQL Server",
        }
    }

    /// Store tags written by this category. WebServer fans out to three records.
    pub fn tags(self) -> &'static [StoreTag] {
        match self {
            Category::Cpu => &[StoreTag::Cpu],
            Category::Memory => &[StoreTag::Memory],
            Category::Disk => &[StoreTag::Disk],
            Category::WebServer => &[StoreTag::Iis, StoreTag::Was, StoreTag::Pool],
            Category::DatabaseEngine => &[StoreTag::Sql],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Suffix of a bucket key; one per persisted record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreTag {
    Cpu,
    Memory,
    Disk,
    Iis,
    Was,
    Pool,
    Sql,
}

impl StoreTag {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreTag::Cpu => "CPU",
            StoreTag::Memory => "MEMORY",
            StoreTag::Disk => "DISK",
            StoreTag::Iis => "IIS",
            StoreTag::Was => "WAS",
            StoreTag::Pool => "POOL",
            StoreTag::Sql => "SQL",
        }
    }

    pub fn category(self) -> Category {
        match self {
            StoreTag::Cpu => Category::Cpu,
            StoreTag::Memory => Category::Memory,
            StoreTag::Disk => Category::Disk,
            StoreTag::Iis | StoreTag::Was | StoreTag::Pool => Category::WebServer,
            StoreTag::Sql => Category::DatabaseEngine,
        }
    }
}

impl fmt::Display for StoreTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
