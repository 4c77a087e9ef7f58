mod sqlite_gamba_store;

pub use sqlite_gamba_store::SqliteGambaStore;
