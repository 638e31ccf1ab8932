//! Open position as seen by the risk controller.

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub code: String,
    pub avg_cost: f64,
    pub current_price: f64,
}

impl Position {
    pub fn new(code: impl Into<String>, avg_cost: f64, current_price: f64) -> Self {
        Self {
            code: code.into(),
            avg_cost,
            current_price,
        }
    }

    /// (price - cost) / cost; `None` when cost is not positive.
    pub fn unrealized_return(&self) -> Option<f64> {
        if self.avg_cost > 0.0 {
            Some((self.current_price - self.avg_cost) / self.avg_cost)
        } else {
            None
        }
    }

    pub fn with_price(&self, price: f64) -> Self {
        Self {
            current_price: price,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrealized_return_gain_and_loss() {
        let pos = Position::new("600036.XSHG", 50.0, 55.0);
        assert!((pos.unrealized_return().unwrap() - 0.1).abs() < 1e-12);

        let pos = pos.with_price(45.0);
        assert!((pos.unrealized_return().unwrap() + 0.1).abs() < 1e-12);
    }

    #[test]
    fn unrealized_return_undefined_without_cost() {
        assert!(Position::new("600036.XSHG", 0.0, 10.0).unrealized_return().is_none());
        assert!(Position::new("600036.XSHG", -1.0, 10.0).unrealized_return().is_none());
    }
}
