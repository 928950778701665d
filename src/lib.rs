//! Interrogation of KNX devices: works out which generation of device it is talking to, reads its
//! interface objects or memory and decodes every value into a readable parameter.

pub mod client;
pub mod codec;
pub mod commands;
pub mod descriptor;
pub mod device_image;
pub mod interrogate;
pub mod manufacturer;
pub mod objects;
pub mod output;
pub mod parameters;
pub mod sink;
