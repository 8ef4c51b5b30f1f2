// Application counter sources for the web server and database engine readers.
//
// FsCounters reads one plain-text number per file, laid out as
//   <root>/<object>/<instance>/<counter>
// with '/' in counter names written as '_' ("Get Requests/sec" -> "Get Requests_sec").
// Counters named "*/sec" hold cumulative totals and are reported as a per-second rate
// against the previous read, so the first read of a rate counter is always 0.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

/// `\object(instance)\counter`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterPath {
    pub object: String,
    pub counter: String,
    pub instance: Option<String>,
}

impl CounterPath {
    pub fn new(object: impl Into<String>, counter: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            counter: counter.into(),
            instance: None,
        }
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn is_rate(&self) -> bool {
        self.counter.ends_with("/sec")
    }
}

impl fmt::Display for CounterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(i) => write!(f, "\\{}({})\\{}", self.object, i, self.counter),
            None => write!(f, "\\{}\\{}", self.object, self.counter),
        }
    }
}

/// Produces the next value of a counter. Blocking; call from a blocking context.
pub trait CounterSource: Send + Sync {
    fn next_value(&self, path: &CounterPath) -> anyhow::Result<f64>;
}

pub struct FsCounters {
    root: PathBuf,
    last: Mutex<HashMap<CounterPath, (f64, Instant)>>,
}

impl FsCounters {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn file_for(&self, path: &CounterPath) -> PathBuf {
        let mut file = self.root.join(&path.object);
        if let Some(instance) = &path.instance {
            file.push(instance);
        }
        file.push(path.counter.replace('/', "_"));
        file
    }

    fn read_raw(&self, path: &CounterPath) -> anyhow::Result<f64> {
        let file = self.file_for(path);
        let content = std::fs::read_to_string(&file)
            .map_err(|e| anyhow::anyhow!("counter {} ({}): {}", path, file.display(), e))?;
        let value: f64 = content
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("counter {}: not a number: {}", path, e))?;
        anyhow::ensure!(value.is_finite(), "counter {}: not finite", path);
        Ok(value)
    }
}

impl CounterSource for FsCounters {
    fn next_value(&self, path: &CounterPath) -> anyhow::Result<f64> {
        let raw = self.read_raw(path)?;
        if !path.is_rate() {
            return Ok(raw);
        }

        let now = Instant::now();
        let mut last = self
            .last
            .lock()
            .map_err(|e| anyhow::anyhow!("counter cache lock poisoned: {}", e))?;
        let rate = match last.get(path) {
            Some(&(prev, prev_ts)) => {
                let dt_secs = now.duration_since(prev_ts).as_secs_f64();
                if dt_secs > 0.0 {
                    // A total that went backwards means the source restarted.
                    (raw - prev).max(0.0) / dt_secs
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        last.insert(path.clone(), (raw, now));
        Ok(rate)
    }
}
