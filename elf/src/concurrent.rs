//! Bounded-concurrency ELF resolution: resolves many targets against a
//! shared [`Resolver`] using a capped `rayon` thread pool, so a recipe with
//! thousands of `L`/`LA`/`i` entries doesn't open that many files at once.

use std::path::PathBuf;

use rootcraft::ElfResolveOptions;
use rootcraft::ElfResolver;
use rootcraft::ResolvedElf;
use rayon::prelude::*;

use crate::resolver::Resolver;

/// One resolution request: the recipe line it came from and the target path.
pub struct Job {
    /// Originating recipe line, threaded through purely for error reporting.
    pub line: usize,
    /// Absolute host filesystem path to resolve.
    pub target: PathBuf,
}

/// Outcome of one [`Job`].
pub struct JobResult {
    /// The line the job came from.
    pub line: usize,
    /// The job's target.
    pub target: PathBuf,
    /// Resolution result.
    pub result: std::result::Result<ResolvedElf, Box<dyn std::error::Error + Send + Sync>>,
}

/// Run `jobs` against `resolver` using a pool capped at `num_workers`
/// threads (0 lets `rayon` pick a default based on available parallelism).
/// Work is distributed across the pool, but results are collected back in
/// the same order `jobs` was given in; the caller decides how that maps
/// onto append order for the entries each job produces.
pub fn resolve_all(resolver: &Resolver, options: &ElfResolveOptions, jobs: Vec<Job>, num_workers: usize) -> Vec<JobResult> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build()
        .expect("thread pool construction should not fail for a positive or zero thread count");

    pool.install(|| {
        jobs.into_par_iter()
            .map(|job| JobResult {
                line: job.line,
                result: resolver.resolve(&job.target, options),
                target: job.target,
            })
            .collect()
    })
}
