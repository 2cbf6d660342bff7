use std::{fs, path::Path};

use crate::{CompiledMdp, MdpError, MdpModel, MdpSpec};

/// Parse an MDP spec from a YAML document without validating it.
pub fn parse_yaml(yaml: &str) -> Result<MdpSpec, MdpError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Load an MDP spec from YAML on disk.
pub fn load_yaml(path: impl AsRef<Path>) -> Result<MdpSpec, MdpError> {
    let yaml = fs::read_to_string(path)?;
    parse_yaml(&yaml)
}

/// Load and compile an MDP from a YAML file.
pub fn compile_yaml(path: impl AsRef<Path>) -> Result<CompiledMdp, MdpError> {
    let spec = load_yaml(path)?;
    spec.compile()
}

/// Load a YAML file straight into a plannable model starting at time 0.
pub fn load_model(path: impl AsRef<Path>) -> Result<MdpModel, MdpError> {
    Ok(MdpModel::new(compile_yaml(path)?))
}

/// Serialize and write an MDP spec to YAML.
pub fn save_yaml(path: impl AsRef<Path>, spec: &MdpSpec) -> Result<(), MdpError> {
    let yaml = serde_yaml::to_string(spec)?;
    fs::write(path, yaml)?;
    Ok(())
}
