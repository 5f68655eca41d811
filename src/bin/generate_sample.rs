use std::collections::BTreeMap;

use anyhow::{Context, Result};
use budget_dashboard::data::export::to_xlsx_bytes;
use budget_dashboard::data::model::{CellValue, Dataset, Record, REQUIRED_FIELDS};

/// Minimal deterministic PRNG (xorshift64*)
struct SimpleRng(u64);

impl SimpleRng {
    fn new(seed: u64) -> Self {
        SimpleRng(seed.wrapping_mul(6364136223846793005).wrapping_add(1) | 1)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let projects = ["ก่อสร้างถนนคอนกรีต", "ขยายเขตประปา", "ติดตั้งไฟฟ้าส่องสว่าง", "ซ่อมแซมสะพาน"];
    let budget_types = ["งบประมาณรายจ่ายประจำปี", "เงินอุดหนุนเฉพาะกิจ", "เงินสะสม"];
    let departments = ["กองช่าง", "กอง1", "กอง3", "กอง10", "สำนักปลัด"];
    let sites = ["หน้าวัด", "หน้าโรงเรียน", "ซอย 4", "ตลาด"];
    let sub_districts = ["ในเมือง", "หนองบัว", "บ้านใหม่"];
    let districts = ["เมือง", "บ้านไผ่"];

    let n_rows = 120;
    let records = (1..=n_rows)
        .map(|seq| {
            let year = 2561 + (rng.next_u64() % 8) as i64;
            let values = [
                CellValue::Integer(seq),
                CellValue::Text(rng.pick(&projects).into()),
                CellValue::Text(rng.pick(&budget_types).into()),
                CellValue::Integer(year),
                CellValue::Text(rng.pick(&departments).into()),
                CellValue::Text(rng.pick(&sites).into()),
                CellValue::Integer(1 + (rng.next_u64() % 12) as i64),
                CellValue::Text(rng.pick(&sub_districts).into()),
                CellValue::Text(rng.pick(&districts).into()),
                CellValue::Text("ขอนแก่น".into()),
            ];
            let fields: BTreeMap<String, CellValue> = REQUIRED_FIELDS
                .iter()
                .map(|f| f.to_string())
                .zip(values)
                .collect();
            Record { fields }
        })
        .collect();

    let dataset = Dataset {
        columns: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
        records,
    };
    let all: Vec<usize> = (0..dataset.len()).collect();
    let bytes = to_xlsx_bytes(&dataset, &all).context("encoding sample workbook")?;

    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_budget.xlsx".to_string());
    std::fs::write(&output_path, bytes).with_context(|| format!("writing {output_path}"))?;

    println!("Wrote {n_rows} budget records to {output_path}");
    Ok(())
}
