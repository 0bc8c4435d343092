// cache.rs: Local payload cache (JSON file, keyed by source locator)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Raw payloads from previous loads, so a song replays without the network.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PayloadCache {
    // Key: source locator, Value: raw payload text
    pub entries: HashMap<String, String>,
}

impl PayloadCache {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        if !path.as_ref().exists() {
            return Ok(PayloadCache::default());
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let cache = serde_json::from_reader(reader)?;
        Ok(cache)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn get(&self, source: &str) -> Option<String> {
        self.entries.get(source).cloned()
    }

    pub fn insert(&mut self, source: &str, payload: &str) {
        self.entries.insert(source.to_string(), payload.to_string());
    }
}
