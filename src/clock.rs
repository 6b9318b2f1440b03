//! Free-running time sources
//!
//! Both counters wrap; callers compare times with `wrapping_sub`, so a
//! wrap-around between two readings is harmless as long as the interval
//! itself fits in a `u32`.

/// Free-running microsecond and millisecond counters
pub trait Clock {
    fn micros(&self) -> u32;

    fn millis(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn micros(&self) -> u32 {
        (**self).micros()
    }

    fn millis(&self) -> u32 {
        (**self).millis()
    }
}

/// True once more than `timeout` has passed since `start` on a wrapping counter
#[inline]
pub fn elapsed(now: u32, start: u32, timeout: u32) -> bool {
    now.wrapping_sub(start) > timeout
}

/// Host clock measured from its creation
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn micros(&self) -> u32 {
        self.origin.elapsed().as_micros() as u32
    }

    fn millis(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }
}
