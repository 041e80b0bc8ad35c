use std::path::Path;

use anyhow::Result;
use chrono::{Duration, NaiveDate};

use candidate_filter::data::export::write_file;
use candidate_filter::data::model::{CellValue, Dataset};

const FIRST_NAMES: &[&str] = &[
    "Ayşe", "Ahmet", "Ali", "Zeynep", "Mehmet", "Elif", "Can", "Deniz", "Emre", "Selin",
];
const LAST_NAMES: &[&str] = &["Yılmaz", "Kaya", "Demir", "Şahin", "Çelik", "Veli", "Arslan"];
const CITIES: &[&str] = &["Ankara", "İstanbul", "İzmir", "Bursa", "Antalya"];
const DEGREES: &[&str] = &["BSc", "MSc", "PhD"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_u64() % (hi - lo + 1) as u64) as i64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.next_u64() as usize % items.len()]
    }

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

fn text(s: impl Into<String>) -> CellValue {
    CellValue::Text(s.into())
}

/// One raw row. Cells are text, as a CSV reader would produce them, with
/// occasional blanks.
fn candidate(id: i64, rng: &mut SimpleRng) -> Vec<CellValue> {
    let epoch = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default();
    let applied = epoch + Duration::days(rng.range(0, 1095));

    let age = if rng.chance(0.05) {
        CellValue::Null
    } else {
        text(rng.range(21, 60).to_string())
    };
    let score = if rng.chance(0.01) {
        CellValue::Null
    } else {
        text(format!("{:.1}", 40.0 + rng.next_f64() * 60.0))
    };
    let remote = if rng.chance(0.1) {
        CellValue::Null
    } else if rng.chance(0.5) {
        text("evet")
    } else {
        text("hayır")
    };

    vec![
        text(id.to_string()),
        text(format!("{} {}", rng.pick(FIRST_NAMES), rng.pick(LAST_NAMES))),
        age,
        text(rng.pick(CITIES)),
        text(rng.pick(DEGREES)),
        text(rng.range(0, 25).to_string()),
        score,
        text(applied.format("%Y-%m-%d").to_string()),
        remote,
    ]
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let names = [
        "candidate_id",
        "name",
        "age",
        "city",
        "degree",
        "experience_years",
        "score",
        "applied_on",
        "remote",
    ];
    let rows: Vec<Vec<CellValue>> = (1..=500).map(|id| candidate(id, &mut rng)).collect();
    let dataset = Dataset::from_rows(names.iter().map(|n| n.to_string()).collect(), rows)?;

    for output_path in ["sample_candidates.csv", "sample_candidates.parquet"] {
        write_file(&dataset, Path::new(output_path))?;
        println!("Wrote {} candidates to {output_path}", dataset.len());
    }
    Ok(())
}
