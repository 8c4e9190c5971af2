//! CPU affinity and thread-priority utilities. The dispatch loops (§5
//! "owned timer thread", "transport worker pool") are latency-sensitive;
//! pinning them to an isolated core avoids cache evictions from OS
//! migration and, on Linux, `SCHED_FIFO` avoids preemption jitter.

use anyhow::Result;
use core_affinity::CoreId;

/// Pin the current thread to a specific CPU core.
pub fn pin_to_core(core: usize) -> Result<()> {
    let core_id = CoreId { id: core };

    if core_affinity::set_for_current(core_id) {
        tracing::info!(core, "pinned thread to CPU core");
        Ok(())
    } else {
        anyhow::bail!("failed to pin thread to core {core}")
    }
}

/// Set real-time thread priority. Requires `CAP_SYS_NICE` or root.
#[cfg(target_os = "linux")]
pub fn set_realtime_priority(priority: i32) -> Result<()> {
    use libc::{sched_param, sched_setscheduler, SCHED_FIFO};

    unsafe {
        let param = sched_param { sched_priority: priority };

        if sched_setscheduler(0, SCHED_FIFO, &param) == 0 {
            tracing::info!(priority, "set thread priority to SCHED_FIFO");
            Ok(())
        } else {
            anyhow::bail!("failed to set thread priority (may need CAP_SYS_NICE or root)")
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_realtime_priority(_priority: i32) -> Result<()> {
    tracing::warn!("real-time priority setting not supported on this platform");
    Ok(())
}

pub fn num_cores() -> usize {
    core_affinity::get_core_ids().map(|ids| ids.len()).unwrap_or(1)
}

/// Pin to `core` and request real-time priority; best-effort, logs and
/// returns on first failure rather than panicking a production process.
pub fn optimize_for_hft(core: usize, priority: i32) -> Result<()> {
    pin_to_core(core)?;
    set_realtime_priority(priority)?;
    tracing::info!(core, priority, "thread optimized for low-latency dispatch");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_cores_is_at_least_one() {
        assert!(num_cores() > 0);
    }

    #[test]
    fn pin_to_core_does_not_panic() {
        if num_cores() > 1 {
            let _ = pin_to_core(0);
        }
    }
}
