use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use drivebill_core::{Aggregate, AggregateRoot, DomainError, DomainResult, Sku};
use drivebill_events::Event;

/// Capacity of the tank, in quarter-tank units.
pub const TANK_MAX: u8 = 4;

/// Aggregate root: Garage.
///
/// Invariants:
/// - `tank_units <= TANK_MAX`
/// - `has_infinite_fuel` implies `tank_units == TANK_MAX`
///
/// Ownership flags only ever go from unowned to owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Garage {
    id: String,
    tank_units: u8,
    has_premium: bool,
    has_infinite_fuel: bool,
    version: u64,
}

impl Garage {
    /// Create an empty garage keyed by its durable slot name.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tank_units: 0,
            has_premium: false,
            has_infinite_fuel: false,
            version: 0,
        }
    }

    pub fn tank_units(&self) -> u8 {
        self.tank_units
    }

    pub fn has_premium(&self) -> bool {
        self.has_premium
    }

    pub fn has_infinite_fuel(&self) -> bool {
        self.has_infinite_fuel
    }

    pub fn is_tank_full(&self) -> bool {
        self.tank_units == TANK_MAX
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.tank_units > TANK_MAX {
            return Err(DomainError::invariant(format!(
                "tank holds {} units, capacity is {TANK_MAX}",
                self.tank_units
            )));
        }
        if self.has_infinite_fuel && self.tank_units != TANK_MAX {
            return Err(DomainError::invariant(
                "infinite fuel requires a full tank",
            ));
        }
        Ok(())
    }
}

impl AggregateRoot for Garage {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: LoadTank (value read back from durable storage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadTank {
    pub units: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddFuel (one consumed unit of fuel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFuel {
    pub sku: Sku,
    pub occurred_at: DateTime<Utc>,
}

/// Command: GrantPremium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantPremium {
    pub sku: Sku,
    pub occurred_at: DateTime<Utc>,
}

/// Command: GrantInfiniteFuel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantInfiniteFuel {
    pub sku: Sku,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GarageCommand {
    LoadTank(LoadTank),
    AddFuel(AddFuel),
    GrantPremium(GrantPremium),
    GrantInfiniteFuel(GrantInfiniteFuel),
    Drive(Drive),
}

/// Event: TankLoaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankLoaded {
    pub units: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FuelAdded.
///
/// `clamped` is set when the tank was already full; the purchase was still
/// consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelAdded {
    pub sku: Sku,
    pub units_after: u8,
    pub clamped: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PremiumGranted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumGranted {
    pub sku: Sku,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InfiniteFuelGranted. Also fills the tank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfiniteFuelGranted {
    pub sku: Sku,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Drove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drove {
    pub units_after: u8,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GarageEvent {
    TankLoaded(TankLoaded),
    FuelAdded(FuelAdded),
    PremiumGranted(PremiumGranted),
    InfiniteFuelGranted(InfiniteFuelGranted),
    Drove(Drove),
}

impl GarageEvent {
    /// Whether applying this event changes the durable tank level.
    pub fn changes_tank(&self) -> bool {
        matches!(
            self,
            GarageEvent::FuelAdded(_) | GarageEvent::InfiniteFuelGranted(_) | GarageEvent::Drove(_)
        )
    }
}

impl Event for GarageEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GarageEvent::TankLoaded(_) => "garage.tank.loaded",
            GarageEvent::FuelAdded(_) => "garage.tank.fuel_added",
            GarageEvent::PremiumGranted(_) => "garage.premium.granted",
            GarageEvent::InfiniteFuelGranted(_) => "garage.infinite_fuel.granted",
            GarageEvent::Drove(_) => "garage.drove",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GarageEvent::TankLoaded(e) => e.occurred_at,
            GarageEvent::FuelAdded(e) => e.occurred_at,
            GarageEvent::PremiumGranted(e) => e.occurred_at,
            GarageEvent::InfiniteFuelGranted(e) => e.occurred_at,
            GarageEvent::Drove(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Garage {
    type Command = GarageCommand;
    type Event = GarageEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GarageEvent::TankLoaded(e) => {
                self.tank_units = e.units;
            }
            GarageEvent::FuelAdded(e) => {
                self.tank_units = e.units_after;
            }
            GarageEvent::PremiumGranted(_) => {
                self.has_premium = true;
            }
            GarageEvent::InfiniteFuelGranted(_) => {
                self.has_infinite_fuel = true;
                self.tank_units = TANK_MAX;
            }
            GarageEvent::Drove(e) => {
                self.tank_units = e.units_after;
            }
        }

        self.version += 1;
        debug_assert!(self.check_invariants().is_ok(), "{self:?}");
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GarageCommand::LoadTank(cmd) => Ok(self.handle_load(cmd)),
            GarageCommand::AddFuel(cmd) => Ok(self.handle_add_fuel(cmd)),
            GarageCommand::GrantPremium(cmd) => Ok(self.handle_grant_premium(cmd)),
            GarageCommand::GrantInfiniteFuel(cmd) => Ok(self.handle_grant_infinite(cmd)),
            GarageCommand::Drive(cmd) => self.handle_drive(cmd),
        }
    }
}

impl Garage {
    fn handle_load(&self, cmd: &LoadTank) -> Vec<GarageEvent> {
        // Out-of-range persisted values are clamped rather than rejected.
        let units = if self.has_infinite_fuel {
            TANK_MAX
        } else {
            cmd.units.clamp(0, i64::from(TANK_MAX)) as u8
        };
        vec![GarageEvent::TankLoaded(TankLoaded {
            units,
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_add_fuel(&self, cmd: &AddFuel) -> Vec<GarageEvent> {
        let clamped = self.tank_units >= TANK_MAX;
        let units_after = self.tank_units.saturating_add(1).min(TANK_MAX);
        vec![GarageEvent::FuelAdded(FuelAdded {
            sku: cmd.sku.clone(),
            units_after,
            clamped,
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_grant_premium(&self, cmd: &GrantPremium) -> Vec<GarageEvent> {
        if self.has_premium {
            return vec![];
        }
        vec![GarageEvent::PremiumGranted(PremiumGranted {
            sku: cmd.sku.clone(),
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_grant_infinite(&self, cmd: &GrantInfiniteFuel) -> Vec<GarageEvent> {
        if self.has_infinite_fuel {
            return vec![];
        }
        vec![GarageEvent::InfiniteFuelGranted(InfiniteFuelGranted {
            sku: cmd.sku.clone(),
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_drive(&self, cmd: &Drive) -> Result<Vec<GarageEvent>, DomainError> {
        if self.has_infinite_fuel {
            return Ok(vec![GarageEvent::Drove(Drove {
                units_after: self.tank_units,
                occurred_at: cmd.occurred_at,
            })]);
        }
        if self.tank_units == 0 {
            return Err(DomainError::OutOfFuel);
        }
        Ok(vec![GarageEvent::Drove(Drove {
            units_after: self.tank_units - 1,
            occurred_at: cmd.occurred_at,
        })])
    }
}
