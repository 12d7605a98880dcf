//! Cached FFT plans with creation/execution concurrency discipline.

use crate::error::{DasError, Result};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// A cached, borrowable forward-FFT plan for one transform length.
pub struct CachedPlan {
    len: usize,
    fft: Arc<dyn Fft<f64>>,
    borrow_count: Mutex<u64>,
    borrow_drained: Condvar,
}

impl CachedPlan {
    /// Number of samples this plan transforms.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Run the transform in place. Any number of threads may call this
    /// concurrently on the same plan — `rustfft`'s `process` only needs
    /// `&self` plus a private scratch buffer per call, it's
    /// [`PlanCache::remove`] that needs the borrow count.
    pub fn execute(&self, buf: &mut [Complex<f64>]) -> Result<()> {
        if buf.len() != self.len {
            return Err(DasError::ShapeMismatch(format!(
                "plan is for length {} but buffer has length {}",
                self.len,
                buf.len()
            )));
        }
        let _guard = self.borrow();
        self.fft.process(buf);
        Ok(())
    }

    fn borrow(&self) -> BorrowGuard<'_> {
        *self.borrow_count.lock().unwrap() += 1;
        BorrowGuard { plan: self }
    }
}

struct BorrowGuard<'a> {
    plan: &'a CachedPlan,
}

impl Drop for BorrowGuard<'_> {
    fn drop(&mut self) {
        let mut count = self.plan.borrow_count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.plan.borrow_drained.notify_all();
        }
    }
}

/// A process-wide cache of [`CachedPlan`]s keyed by transform length.
///
/// Mirrors `dft.c`'s plan table: plans are created lazily on first use
/// and reused across calls. [`PlanCache::remove`] blocks until no
/// thread anywhere is mid-execution of *any* plan from this cache (not
/// just the one being removed) before dropping it, matching the
/// original's global exec-count gate around planner mutation.
pub struct PlanCache {
    plans: Mutex<HashMap<usize, Arc<CachedPlan>>>,
    exec_count: Mutex<u64>,
    exec_drained: Condvar,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanCache {
    pub fn new() -> Self {
        PlanCache {
            plans: Mutex::new(HashMap::new()),
            exec_count: Mutex::new(0),
            exec_drained: Condvar::new(),
        }
    }

    /// Get the cached plan for `len`, creating it if absent.
    pub fn get_or_create(&self, len: usize) -> Result<Arc<CachedPlan>> {
        if len == 0 {
            return Err(DasError::InvalidOp("FFT length must be nonzero".into()));
        }
        let mut plans = self.plans.lock().unwrap();
        if let Some(p) = plans.get(&len) {
            return Ok(p.clone());
        }
        // Plan creation must not race with an in-flight execution of
        // some other cached plan.
        let mut count = self.exec_count.lock().unwrap();
        while *count > 0 {
            count = self.exec_drained.wait(count).unwrap();
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let cached = Arc::new(CachedPlan {
            len,
            fft,
            borrow_count: Mutex::new(0),
            borrow_drained: Condvar::new(),
        });
        plans.insert(len, cached.clone());
        Ok(cached)
    }

    /// Execute the cached plan for `len` against `buf`, creating the
    /// plan if needed, under the global exec-count gate.
    pub fn execute(&self, len: usize, buf: &mut [Complex<f64>]) -> Result<()> {
        let plan = self.get_or_create(len)?;
        {
            let mut count = self.exec_count.lock().unwrap();
            *count += 1;
        }
        let result = plan.execute(buf);
        {
            let mut count = self.exec_count.lock().unwrap();
            *count -= 1;
            if *count == 0 {
                self.exec_drained.notify_all();
            }
        }
        result
    }

    /// Remove the plan for `len` from the cache, if present. Blocks
    /// until no execution is in flight anywhere in this cache, and
    /// until the specific plan's own borrow count has drained.
    pub fn remove(&self, len: usize) {
        let mut count = self.exec_count.lock().unwrap();
        while *count > 0 {
            count = self.exec_drained.wait(count).unwrap();
        }
        drop(count);
        let plan = self.plans.lock().unwrap().remove(&len);
        if let Some(plan) = plan {
            let mut borrows = plan.borrow_count.lock().unwrap();
            while *borrows > 0 {
                borrows = plan.borrow_drained.wait(borrows).unwrap();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.plans.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_plan_for_same_length() {
        let cache = PlanCache::new();
        let a = cache.get_or_create(64).unwrap();
        let b = cache.get_or_create(64).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn execute_transforms_impulse_to_flat_spectrum() {
        let cache = PlanCache::new();
        let mut buf = vec![Complex::new(0.0, 0.0); 8];
        buf[0] = Complex::new(1.0, 0.0);
        cache.execute(8, &mut buf).unwrap();
        for c in &buf {
            assert!((c.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn remove_drops_plan_and_allows_recreation() {
        let cache = PlanCache::new();
        cache.get_or_create(16).unwrap();
        cache.remove(16);
        assert!(cache.is_empty());
        cache.get_or_create(16).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_length_is_rejected() {
        let cache = PlanCache::new();
        assert!(cache.get_or_create(0).is_err());
    }
}
