// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Multi-threaded stepping.
//!
//! One timestep runs as three barrier-synchronised phases: the S group, the
//! C group, then the Q group. Workers process their assigned sub-list of
//! components; the end of each `rayon` scope is the barrier, so no C
//! component can observe a Q write from the same step and vice versa.
//! Peer components within a phase need no ordering at all: the TLM's
//! explicit time delays decouple them, and each node channel has exactly
//! one writing phase.
//!
//! The partitions are built once per `simulate_multi_threaded` call, not
//! per step. Components are balanced across workers by the wall time
//! recorded by [`simulate_and_measure_time`](System::simulate_and_measure_time);
//! without a measurement pass every component weighs the same and the split
//! is uniform. Interior nodes are split the same way for parallel logging.
//!
//! Cancellation is cooperative: the stop flag is observed at the top of
//! every outer iteration and between phases, the current phase drains, and
//! `finalize` runs before `Canceled` is returned.

use std::sync::atomic::Ordering::Relaxed;
use std::time::Instant;

use flume_track::{error, info};
use itertools::Itertools;

use crate::component::{BoxedModel, Model};
use crate::system::System;
use crate::types::{CqsType, SimOutcome, SimResult};

/// Split `items` into `n` lists of approximately equal total weight.
///
/// Heaviest-first greedy: each item lands in the currently lightest list.
/// Without measurements (all weights zero) the split is round-robin.
fn distribute<T>(items: Vec<(f64, T)>, n: usize) -> Vec<Vec<T>> {
    let mut bins: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
    if items.iter().all(|(weight, _)| *weight <= 0.0) {
        for (index, (_, item)) in items.into_iter().enumerate() {
            bins[index % n].push(item);
        }
        return bins;
    }
    let mut weights = vec![0.0_f64; n];
    for (weight, item) in items
        .into_iter()
        .sorted_by(|a, b| b.0.total_cmp(&a.0))
    {
        let lightest = weights
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        weights[lightest] += weight;
        bins[lightest].push(item);
    }
    bins
}

impl System {
    /// Warm-up run recording the wall time of `n_steps` steps per
    /// component, used to balance the multi-threaded partitions.
    ///
    /// This advances component state; run it on a sacrificial stretch of
    /// simulation time (or reload start values afterwards).
    pub fn simulate_and_measure_time(&mut self, n_steps: usize) -> SimResult {
        if !self.initialized {
            return crate::sim_error!("Measure requested before a successful initialize");
        }
        let ts = self.base().timestep();
        let t = self.base().time();
        let stop = t + ts * n_steps as f64;
        for component in &mut self.components {
            let begin = Instant::now();
            component.simulate(t, stop);
            let elapsed = begin.elapsed().as_secs_f64();
            component.base_mut().set_measured_time(elapsed);
        }
        Ok(())
    }

    /// Total measured wall time of all components, recursively.
    #[must_use]
    pub fn total_measured_time(&self) -> f64 {
        self.components
            .iter()
            .map(|c| c.base().measured_time())
            .sum()
    }

    /// Drive the fixed-step outer loop to `stop_t` with `n_threads`
    /// workers.
    ///
    /// Semantics match [`simulate`](System::simulate): same phase order,
    /// same logging, same cancellation behaviour. Sub-systems run
    /// sequentially inside whichever worker owns them.
    pub fn simulate_multi_threaded(&mut self, stop_t: f64, n_threads: usize) -> SimOutcome {
        if !self.initialized {
            error!(self.entity() ; "simulate called before a successful initialize");
            return SimOutcome::NotReady;
        }
        let n_threads = n_threads.max(1);
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                error!(self.entity() ; "Could not start {n_threads} workers ({e}); running single-threaded");
                return self.simulate(stop_t);
            }
        };

        let ts = self.base().timestep();
        let stop_safe = stop_t - ts / 2.0;
        let start_t = self.base().time();
        let stop_flag = self.stop_flag.clone();

        // Node partitions for parallel logging
        let node_bins = distribute(
            self.nodes.iter().map(|n| (1.0, n.clone())).collect(),
            n_threads,
        );

        // Component partitions per phase, balanced by measured cost
        let mut s_refs: Vec<(f64, &mut BoxedModel)> = Vec::new();
        let mut c_refs: Vec<(f64, &mut BoxedModel)> = Vec::new();
        let mut q_refs: Vec<(f64, &mut BoxedModel)> = Vec::new();
        for component in self.components.iter_mut() {
            let weight = component.base().measured_time();
            match component.base().cqs_type() {
                CqsType::S => s_refs.push((weight, component)),
                CqsType::C => c_refs.push((weight, component)),
                CqsType::Q => q_refs.push((weight, component)),
                CqsType::Undefined => {}
            }
        }
        let mut s_bins = distribute(s_refs, n_threads);
        let mut c_bins = distribute(c_refs, n_threads);
        let mut q_bins = distribute(q_refs, n_threads);

        let mut t = start_t;
        let mut canceled = false;
        'outer: while t < stop_safe {
            if stop_flag.load(Relaxed) {
                canceled = true;
                break;
            }

            // Log owned nodes before the S phase
            pool.scope(|scope| {
                for bin in &node_bins {
                    scope.spawn(move |_| {
                        for node in bin {
                            node.log(t);
                        }
                    });
                }
            });

            for bins in [&mut s_bins, &mut c_bins, &mut q_bins] {
                pool.scope(|scope| {
                    for bin in bins.iter_mut() {
                        scope.spawn(move |_| {
                            for component in bin.iter_mut() {
                                component.simulate(t, t + ts);
                            }
                        });
                    }
                });
                // Observed at each phase barrier
                if stop_flag.load(Relaxed) {
                    canceled = true;
                    break 'outer;
                }
            }

            t += ts;
        }
        drop(s_bins);
        drop(c_bins);
        drop(q_bins);

        self.base_mut().set_time(t);
        if canceled {
            info!(self.entity() ; "Simulation canceled at t = {t:.9}");
            self.finalize();
            return SimOutcome::Canceled;
        }
        self.log_all_nodes_recursive(t);
        SimOutcome::Finished
    }
}
