//! Path models between the ground station and an airborne node

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use super::EmulatorError;

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Carrier the models assume unless told otherwise
pub const DEFAULT_CARRIER_HZ: f64 = 2.45e9;

/// Station antenna height above ground
pub const STATION_HEIGHT_M: f64 = 1.5;

const ANTENNA_SIZE_M: f64 = 0.1;

/// Point in metres, ground plane at `z = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }

    /// Image of this point below the ground plane
    pub fn mirrored(&self) -> Self {
        Self::new(self.x, self.y, -self.z)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl FromStr for Position {
    type Err = EmulatorError;

    /// Parse `x,y,z`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EmulatorError::InvalidPosition(s.to_string());
        let coords = s
            .split(',')
            .map(|c| c.trim().parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        match coords[..] {
            [x, y, z] if coords.iter().all(|c| c.is_finite()) => Ok(Self::new(x, y, z)),
            _ => Err(invalid()),
        }
    }
}

/// One propagation path: linear loss, excess delay and extra phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagationPath {
    /// Amplitude divisor; `0` means no loss at all
    pub loss_linear: f64,
    pub delay_s: f64,
    pub phase_rad: f64,
}

impl PropagationPath {
    pub fn direct(loss_linear: f64) -> Self {
        Self {
            loss_linear,
            delay_s: 0.0,
            phase_rad: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathModel {
    /// Line of sight only
    FreeSpace,
    /// Line of sight plus one ground reflection over a flat earth
    FlatEarthTwoRay,
}

/// Station placement and carrier the models are evaluated for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub station: Position,
    pub carrier_hz: f64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            station: Position::new(0.0, 0.0, STATION_HEIGHT_M),
            carrier_hz: DEFAULT_CARRIER_HZ,
        }
    }
}

impl Scenario {
    pub fn with_carrier(carrier_hz: f64) -> Result<Self, EmulatorError> {
        if !carrier_hz.is_finite() || carrier_hz <= 0.0 {
            return Err(EmulatorError::InvalidRate {
                name: "carrier frequency",
                value: carrier_hz,
            });
        }
        Ok(Self {
            carrier_hz,
            ..Default::default()
        })
    }

    pub fn wavelength(&self) -> f64 {
        SPEED_OF_LIGHT / self.carrier_hz
    }

    /// Fraunhofer distance of the station antenna
    pub fn far_field_distance(&self) -> f64 {
        2.0 * ANTENNA_SIZE_M * ANTENNA_SIZE_M / self.wavelength()
    }

    /// Amplitude loss over `distance` metres of free space
    pub fn free_space_loss(&self, distance: f64) -> f64 {
        4.0 * PI * distance / self.wavelength()
    }

    /// Paths from the station to `node` under `model`.
    ///
    /// Inside the antenna near field every model collapses to one path of
    /// unit loss.
    pub fn paths(&self, model: PathModel, node: &Position) -> Vec<PropagationPath> {
        let d_los = self.station.distance_to(node);
        if d_los < self.far_field_distance() {
            return vec![PropagationPath::direct(1.0)];
        }

        let los = PropagationPath::direct(self.free_space_loss(d_los));
        match model {
            PathModel::FreeSpace => vec![los],
            PathModel::FlatEarthTwoRay => {
                let d_nlos = self.station.mirrored().distance_to(node);
                let reflected = PropagationPath {
                    loss_linear: self.free_space_loss(d_nlos),
                    delay_s: (d_nlos - d_los) / SPEED_OF_LIGHT,
                    phase_rad: 0.0,
                };
                vec![los, reflected]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        assert_eq!("1,-2, 3.5".parse::<Position>(), Ok(Position::new(1.0, -2.0, 3.5)));
        assert!("1,2".parse::<Position>().is_err());
        assert!("1,2,3,4".parse::<Position>().is_err());
        assert!("1,x,3".parse::<Position>().is_err());
        assert!("1,2,inf".parse::<Position>().is_err());
    }

    #[test]
    fn test_free_space_loss() {
        let scenario = Scenario::default();
        let node = Position::new(100.0, 0.0, STATION_HEIGHT_M);

        let paths = scenario.paths(PathModel::FreeSpace, &node);

        assert_eq!(paths.len(), 1);
        let expected = 4.0 * PI * 100.0 * 2.45e9 / SPEED_OF_LIGHT;
        assert!((paths[0].loss_linear - expected).abs() < 1e-6);
        assert_eq!(paths[0].delay_s, 0.0);
    }

    #[test]
    fn test_near_field_is_lossless() {
        let scenario = Scenario::default();
        let paths = scenario.paths(PathModel::FlatEarthTwoRay, &scenario.station);
        assert_eq!(paths, vec![PropagationPath::direct(1.0)]);
    }

    #[test]
    fn test_two_ray_reflection() {
        let scenario = Scenario::default();
        let node = Position::new(100.0, 0.0, 50.0);

        let paths = scenario.paths(PathModel::FlatEarthTwoRay, &node);

        assert_eq!(paths.len(), 2);
        let d_los = (100.0f64.powi(2) + 48.5f64.powi(2)).sqrt();
        let d_nlos = (100.0f64.powi(2) + 51.5f64.powi(2)).sqrt();
        assert!((paths[1].delay_s - (d_nlos - d_los) / SPEED_OF_LIGHT).abs() < 1e-15);
        assert!(paths[1].loss_linear > paths[0].loss_linear);
    }

    #[test]
    fn test_invalid_carrier() {
        assert!(Scenario::with_carrier(0.0).is_err());
        assert_eq!(Scenario::with_carrier(915e6).unwrap().carrier_hz, 915e6);
    }
}
