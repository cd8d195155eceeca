use std::fs;

#[derive(Clone)]
pub struct SystemInfo {
    pub ncpus: usize,
    pub cpu_model: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerCounts {
    pub producers: usize,
    pub consumers: usize,
}

impl SystemInfo {
    pub fn detect() -> Self {
        let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        let ncpus = usize::try_from(online).unwrap_or(1).max(1);
        let cpu_model = read_cpu_model().unwrap_or_else(|| "Unknown".into());
        Self { ncpus, cpu_model }
    }
}

impl WorkerCounts {
    /// Splits the CPUs evenly between producers and consumers unless told
    /// otherwise. Never returns zero for either side.
    pub fn with_overrides(
        ncpus: usize,
        producers: Option<usize>,
        consumers: Option<usize>,
    ) -> Self {
        let half = (ncpus / 2).max(1);
        Self {
            producers: producers.unwrap_or(half),
            consumers: consumers.unwrap_or(half),
        }
    }
}

fn read_cpu_model() -> Option<String> {
    let contents = fs::read_to_string("/proc/cpuinfo").ok()?;
    for line in contents.lines() {
        if line.starts_with("model name") {
            if let Some(val) = line.split(':').nth(1) {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}
