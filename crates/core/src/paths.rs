use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".conductor"))
            .unwrap_or_else(|| PathBuf::from(".conductor"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Workflow history records, one JSONL file per UTC day.
    pub fn history_dir(&self) -> PathBuf {
        self.base.join("history")
    }

    pub fn history_file(&self, date: &str) -> PathBuf {
        self.history_dir().join(format!("{}.jsonl", date))
    }

    /// Capability-owned data (kv store, rendered charts).
    pub fn data_dir(&self) -> PathBuf {
        self.base.join("data")
    }

    pub fn kv_db_file(&self) -> PathBuf {
        self.data_dir().join("kv.sqlite")
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.data_dir().join("charts")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.history_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.charts_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
