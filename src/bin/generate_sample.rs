use std::fmt::Write as _;

use rusty_quant::data::schema::{self, FieldRule, COLUMNS};

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

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const ANALYTE: &str = "Testosterone";
const INTERNAL_STANDARD: &str = "Testosterone-d3";
const GRADIENT: f64 = 120.7;
const INTERCEPT: f64 = 0.21;

struct Sample {
    name: String,
    sample_type: &'static str,
    /// Nominal concentration written to the export.
    concentration: Option<f64>,
    /// Concentration the response is simulated from; random when `None`.
    actual: Option<f64>,
}

/// Placeholder text for a column nobody reads.
fn filler(rule: FieldRule) -> &'static str {
    match rule {
        FieldRule::Text => "",
        FieldRule::Integer => "1",
        FieldRule::Date => "3/14/2024 9:00:00 AM",
        FieldRule::Float => "1.00",
        FieldRule::FloatOrZero | FieldRule::FloatOrNull => "N/A",
        FieldRule::Flag => "1",
        FieldRule::SampleType => "Unknown",
        FieldRule::Units => "ng/mL",
        FieldRule::RegressionType => "Linear",
        FieldRule::Weighting => "1 / x",
    }
}

fn data_row(index: usize, sample: &Sample, area: f64) -> String {
    COLUMNS
        .iter()
        .map(|&(name, rule)| match name {
            schema::SAMPLE_NAME => sample.name.clone(),
            schema::SAMPLE_ID => format!("S{:03}", index + 1),
            schema::SAMPLE_TYPE => sample.sample_type.to_string(),
            schema::FILE_NAME => "Batch_0314.wiff".to_string(),
            schema::ANALYTE_PEAK_NAME => ANALYTE.to_string(),
            schema::ANALYTE_PEAK_AREA => format!("{area:.2}"),
            schema::ANALYTE_CONCENTRATION => sample
                .concentration
                .map_or_else(|| "N/A".to_string(), |c| format!("{c:.3}")),
            "IS Peak Name" => INTERNAL_STANDARD.to_string(),
            "Vial Position" => (index + 1).to_string(),
            _ => filler(rule).to_string(),
        })
        .collect::<Vec<_>>()
        .join("\t")
}

fn main() {
    let mut rng = SimpleRng::new(42);

    // 1 / x weighting: every calibrator is above zero, the blank runs as an unknown.
    let mut samples = vec![Sample {
        name: "Double Blank".to_string(),
        sample_type: "Unknown",
        concentration: None,
        actual: Some(0.0),
    }];
    for (i, conc) in [0.025, 0.05, 0.1, 0.2, 0.4, 0.5].into_iter().enumerate() {
        samples.push(Sample {
            name: format!("Cal {}", i + 1),
            sample_type: "Standard",
            concentration: Some(conc),
            actual: Some(conc),
        });
    }
    for (label, conc) in [("Low", 0.05), ("Mid", 0.25), ("High", 0.45)] {
        samples.push(Sample {
            name: format!("QC {label}"),
            sample_type: "Quality Control",
            concentration: Some(conc),
            actual: Some(conc),
        });
    }
    for i in 0..4 {
        samples.push(Sample {
            name: format!("Subject {:02}", i + 1),
            sample_type: "Unknown",
            concentration: None,
            actual: None,
        });
    }

    let mut text = String::new();
    let _ = writeln!(text, "Peak Name: {ANALYTE}");
    let _ = writeln!(text, "Internal Standard: {INTERNAL_STANDARD}");
    let _ = writeln!(text, "Q1/Q3 Masses: 289.20/97.10 Da");
    let _ = writeln!(text);
    let _ = writeln!(text, "Peak Name: {INTERNAL_STANDARD}");
    let _ = writeln!(text, "Use as Internal Standard");
    let _ = writeln!(text, "Q1/Q3 Masses: 292.20/97.10 Da");
    let _ = writeln!(text);
    let _ = writeln!(text, "Fit\tLinear\tWeighting\t1 / x\tIterate\tNo");
    let _ = writeln!(text, "a\t{GRADIENT}");
    let _ = writeln!(text, "b\t{INTERCEPT}");
    let _ = writeln!(text, "c\tN/A");
    let _ = writeln!(text, "r\t0.9991");
    let _ = writeln!(text, "\n\n");
    let _ = writeln!(text, "{}", schema::column_names().collect::<Vec<_>>().join("\t"));

    for (i, sample) in samples.iter().enumerate() {
        let conc = sample
            .actual
            .unwrap_or_else(|| 0.05 + 0.4 * rng.next_f64());
        let area = (GRADIENT * conc + INTERCEPT + rng.gauss(0.0, 0.3)).max(0.0);
        let _ = writeln!(text, "{}", data_row(i, sample, area));
    }

    let output_path = "sample_export.txt";
    std::fs::write(output_path, text).expect("Failed to write sample export");

    println!("Wrote {} samples to {output_path}", samples.len());
}
