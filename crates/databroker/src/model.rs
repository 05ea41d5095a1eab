//! Typed view of the part of the vehicle signal tree this application uses.

use std::sync::Arc;

use shared::domain::{FrontWipingMode, HoodIsOpen};

use crate::{DataBroker, DataPointAccessor};

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub body: Body,
}

#[derive(Debug, Clone)]
pub struct Body {
    pub hood: Hood,
    pub windshield: Windshield,
}

#[derive(Debug, Clone)]
pub struct Hood {
    pub is_open: DataPointAccessor<HoodIsOpen>,
}

#[derive(Debug, Clone)]
pub struct Windshield {
    pub front: WindshieldSide,
}

#[derive(Debug, Clone)]
pub struct WindshieldSide {
    pub wiping: Wiping,
}

#[derive(Debug, Clone)]
pub struct Wiping {
    pub mode: DataPointAccessor<FrontWipingMode>,
}

impl Vehicle {
    pub fn new(broker: Arc<dyn DataBroker>) -> Self {
        Self {
            body: Body {
                hood: Hood {
                    is_open: DataPointAccessor::new(Arc::clone(&broker)),
                },
                windshield: Windshield {
                    front: WindshieldSide {
                        wiping: Wiping {
                            mode: DataPointAccessor::new(broker),
                        },
                    },
                },
            },
        }
    }
}
