//! Sweep a grid of contracts through both engines and report the largest divergence
//!
//! Every case runs through one shared `CommutationEngine`, so the parallel
//! sweep also exercises concurrent column inserts.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use rayon::prelude::*;

use barwert_engine::mortality::{MortalityTables, Sex, TableId};
use barwert_engine::present_value::equivalence::{check_case, EquivalenceCase};
use barwert_engine::present_value::{CommutationEngine, DirectEngine};
use barwert_engine::ValuationError;

const AGES: [u32; 8] = [20, 30, 40, 50, 60, 70, 80, 90];
const TERMS: [i32; 6] = [1, 5, 10, 20, 30, 40];
const RATES: [f64; 6] = [0.0, 0.005, 0.0175, 0.025, 0.035, 0.05];
const FREQUENCIES: [u32; 4] = [1, 2, 4, 12];
const TABLES: [TableId; 2] = [TableId::Iam2012Basic, TableId::Iam2012Graded];

fn grid() -> Vec<EquivalenceCase> {
    let mut cases = Vec::new();
    for &table in &TABLES {
        for sex in Sex::ALL {
            for &age in &AGES {
                for &n in &TERMS {
                    for &rate in &RATES {
                        for &zw in &FREQUENCIES {
                            cases.push(EquivalenceCase {
                                age,
                                n,
                                // Premium term: two thirds of the contract term
                                t: (2 * n) / 3,
                                sex,
                                table,
                                rate,
                                zw,
                            });
                        }
                    }
                }
            }
        }
    }
    cases
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let start = Instant::now();
    let tables = Arc::new(MortalityTables::builtin());
    let direct = DirectEngine::new(Arc::clone(&tables));
    let commutation = CommutationEngine::new(tables);

    let cases = grid();
    println!("Comparing engines over {} cases...", cases.len());

    let results: Vec<(EquivalenceCase, Result<f64, ValuationError>)> = cases
        .par_iter()
        .map(|case| (*case, check_case(&direct, &commutation, case)))
        .collect();

    let mut worst: Option<(f64, EquivalenceCase)> = None;
    let mut failures = 0usize;
    for (case, result) in &results {
        match result {
            Ok(error) => {
                if worst.is_none_or(|(w, _)| *error > w) {
                    worst = Some((*error, *case));
                }
            }
            Err(err) => {
                failures += 1;
                eprintln!("{}", err);
            }
        }
    }

    let stats = commutation.cache_stats();
    println!("Completed in {:?}", start.elapsed());
    println!(
        "Commutation cache: {} columns, {} hits, {} misses (hit rate {:.1}%)",
        stats.entries,
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );

    if let Some((error, case)) = worst {
        println!(
            "Largest relative error {:.3e} at age {}, n {}, {} {}, i {}, zw {}",
            error, case.age, case.n, case.sex, case.table, case.rate, case.zw
        );
    }

    if failures > 0 {
        eprintln!("{} of {} cases diverged", failures, results.len());
        return Ok(ExitCode::FAILURE);
    }
    println!("All {} cases agree", results.len());
    Ok(ExitCode::SUCCESS)
}
