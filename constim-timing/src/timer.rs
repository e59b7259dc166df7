use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Clock used for pacing delays and trial timestamps
pub trait Timer {
    /// Nanoseconds since the timer was created.
    fn now(&self) -> u64;
    fn elapsed(&self, since_ns: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(since_ns))
    }
    fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(target_os = "macos")]
        self.macos_sleep(duration);
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, EINTR, clock_nanosleep, timespec};

        let mut left = duration;
        loop {
            let req = to_timespec(left);
            let mut rem = timespec {
                tv_sec: 0,
                tv_nsec: 0,
            };
            let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, &mut rem) };
            match rc {
                0 => return,
                // Interrupted: only the unslept remainder is still owed.
                EINTR => left = from_timespec(&rem),
                _ => {
                    std::thread::sleep(left);
                    return;
                }
            }
            if left.is_zero() {
                return;
            }
        }
    }

    #[cfg(target_os = "macos")]
    fn macos_sleep(&self, duration: Duration) {
        use mach2::mach_time::{mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t};

        if duration.as_nanos() < 100_000 {
            unsafe {
                let start = mach_absolute_time();
                let mut timebase = mach_timebase_info_data_t { numer: 0, denom: 0 };
                mach_timebase_info(&mut timebase);

                let target_ticks =
                    duration.as_nanos() as u64 * timebase.denom as u64 / timebase.numer as u64;

                while mach_absolute_time() - start < target_ticks {
                    std::hint::spin_loop();
                }
            }
        } else {
            std::thread::sleep(duration);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
fn to_timespec(d: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    }
}

#[cfg(target_os = "linux")]
fn from_timespec(ts: &libc::timespec) -> Duration {
    Duration::new(
        ts.tv_sec.max(0) as u64,
        ts.tv_nsec.clamp(0, 999_999_999) as u32,
    )
}

/// Virtual clock: `sleep` advances time instantly. Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTimer {
    now_ns: Rc<Cell<u64>>,
}

impl SimulatedTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns.set(self.now_ns.get() + d.as_nanos() as u64);
    }
}

impl Timer for SimulatedTimer {
    fn now(&self) -> u64 {
        self.now_ns.get()
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_sleep_advances_shared_clock() {
        let timer = SimulatedTimer::new();
        let handle = timer.clone();
        let t0 = timer.now();
        timer.sleep(Duration::from_millis(500));
        assert_eq!(handle.now(), t0 + 500_000_000);
        assert_eq!(handle.elapsed(t0), Duration::from_millis(500));
    }

    #[test]
    fn high_precision_sleep_waits_at_least_requested() {
        let timer = HighPrecisionTimer::new();
        let t0 = timer.now();
        timer.sleep(Duration::from_millis(2));
        assert!(timer.elapsed(t0) >= Duration::from_millis(2));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn interrupted_sleep_resumes_with_the_remainder() {
        let d = Duration::new(1, 250_000_000);
        assert_eq!(from_timespec(&to_timespec(d)), d);

        // What the kernel reports as unslept after an interrupt.
        let rem = libc::timespec {
            tv_sec: 0,
            tv_nsec: 40_000_000,
        };
        assert_eq!(from_timespec(&rem), Duration::from_millis(40));

        let garbage = libc::timespec {
            tv_sec: -3,
            tv_nsec: -1,
        };
        assert_eq!(from_timespec(&garbage), Duration::ZERO);
    }
}
