#![allow(non_snake_case)]

use types::Float;
pub extern crate nalgebra as na;

pub mod coordinate;
pub mod dynamics;
pub mod energy;
pub mod error;
pub mod helpers;
pub mod inertia;
pub mod integrators;
pub mod inverse_kinematics;
pub mod joint;
pub mod link;
pub mod mechanism;
pub mod spatial;
pub mod types;
pub mod util;

pub const GRAVITY: Float = 9.81;

pub const PI: Float = std::f64::consts::PI;
