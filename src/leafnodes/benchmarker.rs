//! Measurement collection for measure specs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::Measurement;

/// Accumulates named samples across every run of one measure spec
#[derive(Debug, Default)]
pub struct Benchmarker {
    measurements: BTreeMap<String, Measurement>,
    order_counter: usize,
}

impl Benchmarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_time(&mut self, name: &str, elapsed: Duration) {
        self.measurement(name, "s").results.push(elapsed.as_secs_f64());
    }

    pub fn record_value(&mut self, name: &str, value: f64) {
        self.measurement(name, "").results.push(value);
    }

    /// Snapshot with smallest/largest/average/std-deviation filled in
    pub fn report(&self) -> BTreeMap<String, Measurement> {
        self.measurements
            .iter()
            .map(|(name, measurement)| (name.clone(), with_statistics(measurement.clone())))
            .collect()
    }

    fn measurement(&mut self, name: &str, units: &str) -> &mut Measurement {
        let order = self.order_counter;
        let measurement = self
            .measurements
            .entry(name.to_string())
            .or_insert_with(|| Measurement {
                name: name.to_string(),
                order,
                units: units.to_string(),
                ..Default::default()
            });
        if measurement.order == order {
            self.order_counter += 1;
        }
        measurement
    }
}

fn with_statistics(mut measurement: Measurement) -> Measurement {
    if measurement.results.is_empty() {
        return measurement;
    }
    let n = measurement.results.len() as f64;
    let mut smallest = f64::MAX;
    let mut largest = f64::MIN;
    let mut sum = 0.0;
    let mut sum_of_squares = 0.0;
    for &result in &measurement.results {
        smallest = smallest.min(result);
        largest = largest.max(result);
        sum += result;
        sum_of_squares += result * result;
    }
    let average = sum / n;
    measurement.smallest = smallest;
    measurement.largest = largest;
    measurement.average = average;
    measurement.std_deviation = (sum_of_squares / n - average * average).max(0.0).sqrt();
    measurement
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_statistics() {
        let mut b = Benchmarker::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            b.record_value("latency", v);
        }
        let report = b.report();
        let m = &report["latency"];
        assert_eq!(m.results.len(), 8);
        assert_eq!(m.smallest, 2.0);
        assert_eq!(m.largest, 9.0);
        assert_eq!(m.average, 5.0);
        assert!((m.std_deviation - 2.0).abs() < 1e-9);
        assert_eq!(m.units, "");
    }

    #[test]
    fn test_declaration_order() {
        let mut b = Benchmarker::new();
        b.record_value("second", 1.0);
        b.record_time("first", Duration::from_millis(10));
        b.record_value("second", 2.0);
        let report = b.report();
        assert_eq!(report["second"].order, 0);
        assert_eq!(report["first"].order, 1);
        assert_eq!(report["first"].units, "s");
        assert_eq!(report["second"].results, vec![1.0, 2.0]);
    }
}
