//! `.rendercaps` capability descriptor files.
//!
//! A descriptor emulates a specific device by listing its capabilities by
//! name. Several blocks may share one file:
//!
//! ```text
//! // comment
//! render_system_capabilities "Budget Laptop"
//! {
//!     render_system_name Mock
//!     device_name Example GPU 9000
//!     driver_version 1.2.3.4
//!     vendor nvidia
//!     vertex_program true
//!     shader_profile wgsl
//!     num_texture_units 8
//!     max_point_size 64
//! }
//! ```
//!
//! Malformed lines are reported as [`ParseDiagnostic`]s and logged; parsing
//! carries on with the next line where it can.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::capabilities::{Capability, CapabilitiesCategory, RenderSystemCapabilities};
use crate::gpu_program::GpuProgramType;

pub const RENDERCAPS_EXTENSION: &str = "rendercaps";

const HEADER_KEYWORD: &str = "render_system_capabilities";

// ===== Errors =====

#[derive(Debug)]
pub enum RenderCapsError {
    Io { path: PathBuf, source: std::io::Error },
    /// The file produced no capability block.
    Parse { source_name: String, diagnostics: Vec<ParseDiagnostic> },
}

impl fmt::Display for RenderCapsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderCapsError::Io { path, source } => {
                write!(f, "Failed to access '{}': {}", path.display(), source)
            }
            RenderCapsError::Parse {
                source_name,
                diagnostics,
            } => {
                write!(f, "No capabilities parsed from '{}'", source_name)?;
                if let Some(first) = diagnostics.first() {
                    write!(f, ": {}", first)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RenderCapsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderCapsError::Io { source, .. } => Some(source),
            RenderCapsError::Parse { .. } => None,
        }
    }
}

pub type RenderCapsResult<T> = Result<T, RenderCapsError>;

// ===== Parsing =====

/// A problem found while parsing. `line` is 1-based, 0 for whole-file problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

/// Everything read from one descriptor source.
#[derive(Debug, Clone, Default)]
pub struct ParsedRenderCaps {
    /// Named capability sets in file order.
    pub capabilities: Vec<(String, RenderSystemCapabilities)>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseAction {
    Header,
    OpenBrace,
    CollectLines,
}

struct Parser<'a> {
    source_name: &'a str,
    diagnostics: Vec<ParseDiagnostic>,
}

impl Parser<'_> {
    fn error(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        if line == 0 {
            tracing::warn!("Error in .rendercaps {}: {}", self.source_name, message);
        } else {
            tracing::warn!(
                "Error in .rendercaps {}:{}: {}",
                self.source_name,
                line,
                message
            );
        }
        self.diagnostics.push(ParseDiagnostic { line, message });
    }

    fn apply_lines(&mut self, caps: &mut RenderSystemCapabilities, lines: &[(usize, &str)]) {
        for &(number, line) in lines {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let [keyword, params @ ..] = tokens.as_slice() else {
                continue;
            };
            if params.is_empty() {
                self.error(number, format!("No parameters given for '{}'", keyword));
                continue;
            }
            if let Err(message) = apply_keyword(caps, keyword, params) {
                self.error(number, message);
            }
        }
    }
}

/// Parse descriptor `text`. `source_name` only appears in diagnostics.
pub fn parse_script(source_name: &str, text: &str) -> ParsedRenderCaps {
    let mut parser = Parser {
        source_name,
        diagnostics: Vec::new(),
    };
    let mut capabilities = Vec::new();
    let mut action = ParseAction::Header;
    let mut current_name = String::new();
    let mut collected: Vec<(usize, &str)> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        match action {
            ParseAction::Header => {
                let Some(rest) = line.strip_prefix(HEADER_KEYWORD) else {
                    parser.error(
                        number,
                        format!("The first keyword must be {}", HEADER_KEYWORD),
                    );
                    return ParsedRenderCaps {
                        capabilities,
                        diagnostics: parser.diagnostics,
                    };
                };
                match parse_quoted(rest.trim()) {
                    Some(name) => {
                        tracing::debug!("Found render system capabilities '{}'", name);
                        current_name = name.to_string();
                        action = ParseAction::OpenBrace;
                    }
                    None => {
                        parser.error(
                            number,
                            format!(
                                "The argument to {} must be a quote delimited string",
                                HEADER_KEYWORD
                            ),
                        );
                        return ParsedRenderCaps {
                            capabilities,
                            diagnostics: parser.diagnostics,
                        };
                    }
                }
            }
            ParseAction::OpenBrace => {
                if line == "{" {
                    action = ParseAction::CollectLines;
                } else {
                    parser.error(number, format!("Expected '{{' got: {}", line));
                }
            }
            ParseAction::CollectLines => {
                if line == "}" {
                    let mut caps = RenderSystemCapabilities::new();
                    parser.apply_lines(&mut caps, &collected);
                    collected.clear();
                    capabilities.push((std::mem::take(&mut current_name), caps));
                    action = ParseAction::Header;
                } else {
                    collected.push((number, line));
                }
            }
        }
    }

    match action {
        ParseAction::Header if capabilities.is_empty() => parser.error(0, "The file is empty"),
        ParseAction::Header => {}
        ParseAction::OpenBrace => parser.error(0, "Were not able to find a '{'"),
        ParseAction::CollectLines => parser.error(0, "Were not able to find a '}'"),
    }

    ParsedRenderCaps {
        capabilities,
        diagnostics: parser.diagnostics,
    }
}

fn parse_quoted(s: &str) -> Option<&str> {
    s.strip_prefix('"')?.strip_suffix('"')
}

fn parse_bool(s: &str) -> bool {
    matches!(s, "true" | "yes" | "1")
}

fn parse_number<T: std::str::FromStr>(keyword: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value '{}' for '{}'", value, keyword))
}

/// Which per-stage constant count a keyword names.
#[derive(Clone, Copy)]
enum ConstantKind {
    Float,
    Int,
    Bool,
}

impl ConstantKind {
    const ALL: [ConstantKind; 3] = [ConstantKind::Float, ConstantKind::Int, ConstantKind::Bool];

    fn as_str(self) -> &'static str {
        match self {
            ConstantKind::Float => "float",
            ConstantKind::Int => "int",
            ConstantKind::Bool => "bool",
        }
    }
}

fn constant_count_keyword(stage: GpuProgramType, kind: ConstantKind) -> String {
    format!("{}_program_constant_{}_count", stage.keyword_prefix(), kind.as_str())
}

fn parse_constant_count_keyword(keyword: &str) -> Option<(GpuProgramType, ConstantKind)> {
    GpuProgramType::ALL.into_iter().find_map(|stage| {
        ConstantKind::ALL
            .into_iter()
            .find(|kind| constant_count_keyword(stage, *kind) == keyword)
            .map(|kind| (stage, kind))
    })
}

fn apply_keyword(
    caps: &mut RenderSystemCapabilities,
    keyword: &str,
    params: &[&str],
) -> Result<(), String> {
    let first = params[0];
    let joined = || params.join(" ");

    match keyword {
        "render_system_name" => caps.set_render_system_name(joined()),
        "device_name" => caps.set_device_name(joined()),
        "driver_version" => caps.parse_driver_version_from_string(first),
        "vendor" => caps.parse_vendor_from_string(&joined()),
        "shader_profile" => caps.add_shader_profile(first),
        "num_world_matrices" => caps.set_num_world_matrices(parse_number(keyword, first)?),
        "num_texture_units" => caps.set_num_texture_units(parse_number(keyword, first)?),
        "num_vertex_texture_units" => {
            caps.set_num_vertex_texture_units(parse_number(keyword, first)?)
        }
        "stencil_buffer_bit_depth" => {
            caps.set_stencil_buffer_bit_depth(parse_number(keyword, first)?)
        }
        "num_vertex_blend_matrices" => {
            caps.set_num_vertex_blend_matrices(parse_number(keyword, first)?)
        }
        "num_multi_render_targets" => {
            caps.set_num_multi_render_targets(parse_number(keyword, first)?)
        }
        "num_vertex_attributes" => caps.set_num_vertex_attributes(parse_number(keyword, first)?),
        "geometry_program_num_output_vertices" => {
            caps.set_geometry_program_num_output_vertices(parse_number(keyword, first)?)
        }
        "max_point_size" => caps.set_max_point_size(parse_number(keyword, first)?),
        "max_supported_anisotropy" => {
            caps.set_max_supported_anisotropy(parse_number(keyword, first)?)
        }
        "non_pow2_textures_limited" => caps.set_non_pow2_textures_limited(parse_bool(first)),
        "vertex_texture_units_shared" => caps.set_vertex_texture_units_shared(parse_bool(first)),
        _ => {
            if let Some(cap) = Capability::from_name(keyword) {
                let category = cap.category();
                if category.is_render_system_specific() {
                    caps.set_category_relevant(category, true);
                }
                caps.set_capability_enabled(cap, parse_bool(first));
            } else if let Some((stage, kind)) = parse_constant_count_keyword(keyword) {
                let count = parse_number(keyword, first)?;
                match kind {
                    ConstantKind::Float => caps.set_constant_float_count(stage, count),
                    ConstantKind::Int => caps.set_constant_int_count(stage, count),
                    ConstantKind::Bool => caps.set_constant_bool_count(stage, count),
                }
            } else {
                return Err(format!("Unknown capability keyword: {}", keyword));
            }
        }
    }
    Ok(())
}

// ===== Writing =====

/// Serialize `caps` as a descriptor block called `name`.
///
/// Flags of render-system-specific categories are only written when that
/// category is relevant.
pub fn write_script(caps: &RenderSystemCapabilities, name: &str) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{} \"{}\"", HEADER_KEYWORD, name);
    out.push_str("{\n");

    if !caps.render_system_name().is_empty() {
        let _ = writeln!(out, "\trender_system_name {}", caps.render_system_name());
    }
    out.push('\n');
    if !caps.device_name().is_empty() {
        let _ = writeln!(out, "\tdevice_name {}", caps.device_name());
    }
    let _ = writeln!(out, "\tdriver_version {}", caps.driver_version());
    let _ = writeln!(
        out,
        "\tvendor {}",
        RenderSystemCapabilities::vendor_to_string(caps.vendor())
    );
    out.push('\n');

    for category in CapabilitiesCategory::ALL {
        if !caps.is_category_relevant(category) {
            continue;
        }
        for cap in Capability::in_category(category) {
            let _ = writeln!(out, "\t{} {}", cap.name(), caps.has_capability(cap));
        }
    }
    out.push('\n');

    for profile in caps.supported_shader_profiles() {
        let _ = writeln!(out, "\tshader_profile {}", profile);
    }
    out.push('\n');

    let _ = writeln!(out, "\tmax_point_size {}", caps.max_point_size());
    let _ = writeln!(out, "\tmax_supported_anisotropy {}", caps.max_supported_anisotropy());
    let _ = writeln!(out, "\tnon_pow2_textures_limited {}", caps.non_pow2_textures_limited());
    let _ = writeln!(out, "\tvertex_texture_units_shared {}", caps.vertex_texture_units_shared());
    out.push('\n');

    let scalars = [
        ("num_world_matrices", i64::from(caps.num_world_matrices())),
        ("num_texture_units", i64::from(caps.num_texture_units())),
        ("num_vertex_texture_units", i64::from(caps.num_vertex_texture_units())),
        ("stencil_buffer_bit_depth", i64::from(caps.stencil_buffer_bit_depth())),
        ("num_vertex_blend_matrices", i64::from(caps.num_vertex_blend_matrices())),
        ("num_multi_render_targets", i64::from(caps.num_multi_render_targets())),
        ("num_vertex_attributes", i64::from(caps.num_vertex_attributes())),
        (
            "geometry_program_num_output_vertices",
            i64::from(caps.geometry_program_num_output_vertices()),
        ),
    ];
    for (keyword, value) in scalars {
        let _ = writeln!(out, "\t{} {}", keyword, value);
    }

    for stage in GpuProgramType::ALL {
        let counts = caps.constant_counts(stage);
        for (kind, value) in ConstantKind::ALL
            .into_iter()
            .zip([counts.float, counts.int, counts.bool])
        {
            let _ = writeln!(out, "\t{} {}", constant_count_keyword(stage, kind), value);
        }
    }

    out.push_str("}\n");
    out
}

pub fn write_to_file(
    caps: &RenderSystemCapabilities,
    name: &str,
    path: impl AsRef<Path>,
) -> RenderCapsResult<()> {
    let path = path.as_ref();
    std::fs::write(path, write_script(caps, name)).map_err(|source| RenderCapsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Wrote render system capabilities '{}' to {}", name, path.display());
    Ok(())
}

/// Parse one descriptor file. Fails only on I/O errors.
pub fn load_from_file(path: impl AsRef<Path>) -> RenderCapsResult<ParsedRenderCaps> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| RenderCapsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_script(&path.display().to_string(), &text))
}

// ===== Library =====

/// Named capability sets collected from descriptor files.
#[derive(Debug, Clone, Default)]
pub struct CapabilitiesLibrary {
    entries: IndexMap<String, RenderSystemCapabilities>,
}

impl CapabilitiesLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a set, replacing an earlier one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, caps: RenderSystemCapabilities) {
        let name = name.into();
        if self.entries.insert(name.clone(), caps).is_some() {
            tracing::warn!("Render system capabilities '{}' replaced", name);
        }
    }

    /// Parse `text` and add every block found. Returns the diagnostics.
    pub fn parse_script(&mut self, source_name: &str, text: &str) -> Vec<ParseDiagnostic> {
        let parsed = parse_script(source_name, text);
        for (name, caps) in parsed.capabilities {
            self.insert(name, caps);
        }
        parsed.diagnostics
    }

    /// Parse a file. Returns the number of capability sets it contained.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> RenderCapsResult<usize> {
        let parsed = load_from_file(path.as_ref())?;
        if parsed.capabilities.is_empty() {
            return Err(RenderCapsError::Parse {
                source_name: path.as_ref().display().to_string(),
                diagnostics: parsed.diagnostics,
            });
        }
        let count = parsed.capabilities.len();
        for (name, caps) in parsed.capabilities {
            self.insert(name, caps);
        }
        Ok(count)
    }

    /// Parse every `*.rendercaps` file directly inside `dir`.
    ///
    /// Files that fail to parse are logged and skipped. Returns the number of
    /// capability sets added.
    pub fn parse_directory(&mut self, dir: impl AsRef<Path>) -> RenderCapsResult<usize> {
        let dir = dir.as_ref();
        let io_err = |source| RenderCapsError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(RENDERCAPS_EXTENSION)
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut added = 0;
        for path in paths {
            match self.parse_file(&path) {
                Ok(count) => added += count,
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        tracing::info!("Loaded {} render system capabilities from {}", added, dir.display());
        Ok(added)
    }

    pub fn load_parsed_capabilities(&self, name: &str) -> Option<&RenderSystemCapabilities> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{DriverVersion, GpuVendor};

    const SAMPLE: &str = r#"
// A tiny descriptor
render_system_capabilities "Example Card"
{
    render_system_name Mock Render System
    device_name Example GPU 9000
    driver_version 1.2.3.4
    vendor nvidia

    vertex_program true
    fragment_program yes
    hwstencil false
    fbo true
    shader_profile wgsl
    shader_profile glsl

    num_texture_units 8
    vertex_program_constant_float_count 256
    max_point_size 64.5
    vertex_texture_units_shared true
}
"#;

    #[test]
    fn test_parse_sample() {
        let parsed = parse_script("sample", SAMPLE);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        assert_eq!(parsed.capabilities.len(), 1);

        let (name, caps) = &parsed.capabilities[0];
        assert_eq!(name, "Example Card");
        assert_eq!(caps.render_system_name(), "Mock Render System");
        assert_eq!(caps.device_name(), "Example GPU 9000");
        assert_eq!(caps.driver_version(), DriverVersion::new(1, 2, 3, 4));
        assert_eq!(caps.vendor(), GpuVendor::Nvidia);
        assert!(caps.has_capability(Capability::VertexProgram));
        assert!(caps.has_capability(Capability::FragmentProgram));
        assert!(!caps.has_capability(Capability::HwStencil));
        assert!(caps.has_capability(Capability::Fbo));
        assert!(caps.is_category_relevant(CapabilitiesCategory::Gl));
        assert!(caps.is_shader_profile_supported("wgsl"));
        assert!(caps.is_shader_profile_supported("glsl"));
        assert_eq!(caps.num_texture_units(), 8);
        assert_eq!(caps.constant_float_count(GpuProgramType::Vertex), 256);
        assert_eq!(caps.max_point_size(), 64.5);
        assert!(caps.vertex_texture_units_shared());
    }

    #[test]
    fn test_unknown_keyword_is_reported_and_skipped() {
        let text = "render_system_capabilities \"X\"\n{\n    warp_drive true\n    num_texture_units 4\n}\n";
        let parsed = parse_script("x", text);
        assert_eq!(parsed.capabilities.len(), 1);
        assert_eq!(parsed.capabilities[0].1.num_texture_units(), 4);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].line, 3);
        assert!(parsed.diagnostics[0].message.contains("warp_drive"));
    }

    #[test]
    fn test_missing_parameter() {
        let text = "render_system_capabilities \"X\"\n{\n    vendor\n}\n";
        let parsed = parse_script("x", text);
        assert_eq!(parsed.capabilities.len(), 1);
        assert_eq!(parsed.diagnostics[0].line, 3);
    }

    #[test]
    fn test_bad_header_aborts() {
        let parsed = parse_script("x", "capabilities \"X\"\n{\n}\n");
        assert!(parsed.capabilities.is_empty());
        assert_eq!(parsed.diagnostics.len(), 1);

        let parsed = parse_script("x", "render_system_capabilities X\n{\n}\n");
        assert!(parsed.capabilities.is_empty());
        assert_eq!(parsed.diagnostics.len(), 1);
    }

    #[test]
    fn test_structural_errors() {
        let empty = parse_script("x", "// nothing here\n\n");
        assert_eq!(empty.diagnostics[0].message, "The file is empty");

        let no_brace = parse_script("x", "render_system_capabilities \"X\"\n");
        assert!(no_brace.diagnostics[0].message.contains("'{'"));

        let no_close = parse_script("x", "render_system_capabilities \"X\"\n{\n vbo true\n");
        assert!(no_close.capabilities.is_empty());
        assert!(no_close.diagnostics[0].message.contains("'}'"));
    }

    #[test]
    fn test_stray_line_before_brace_continues() {
        let text = "render_system_capabilities \"X\"\noops\n{\n vbo true\n}\n";
        let parsed = parse_script("x", text);
        assert_eq!(parsed.capabilities.len(), 1);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].line, 2);
    }

    #[test]
    fn test_multiple_blocks() {
        let text = "render_system_capabilities \"A\"\n{\n vbo true\n}\nrender_system_capabilities \"B\"\n{\n vbo false\n}\n";
        let parsed = parse_script("x", text);
        let names: Vec<&str> = parsed.capabilities.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_write_then_parse() {
        let mut caps = RenderSystemCapabilities::new();
        caps.set_render_system_name("Mock");
        caps.set_vendor(GpuVendor::Amd);
        caps.set_driver_version(DriverVersion::new(2, 0, 1, 0));
        caps.set_capability(Capability::Blending);
        caps.set_capability(Capability::ComputeProgram);
        caps.add_shader_profile("wgsl");
        caps.set_num_texture_units(16);
        caps.set_constant_int_count(GpuProgramType::Fragment, 32);

        let text = write_script(&caps, "Written");
        let parsed = parse_script("written", &text);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

        let (name, read) = &parsed.capabilities[0];
        assert_eq!(name, "Written");
        assert_eq!(read.render_system_name(), "Mock");
        assert_eq!(read.vendor(), GpuVendor::Amd);
        assert_eq!(read.driver_version(), DriverVersion::new(2, 0, 1, 0));
        assert!(read.has_capability(Capability::Blending));
        assert!(read.has_capability(Capability::ComputeProgram));
        assert!(!read.has_capability(Capability::Dot3));
        assert_eq!(read.num_texture_units(), 16);
        assert_eq!(read.constant_int_count(GpuProgramType::Fragment), 32);
        assert!(!read.is_category_relevant(CapabilitiesCategory::D3d9));
    }

    #[test]
    fn test_write_then_parse_defaults() {
        let caps = RenderSystemCapabilities::new();
        let text = write_script(&caps, "Blank");
        assert!(!text.contains("render_system_name"));

        let parsed = parse_script("blank", &text);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let (name, read) = &parsed.capabilities[0];
        assert_eq!(name, "Blank");
        assert_eq!(read.render_system_name(), "");
        assert_eq!(read.vendor(), GpuVendor::Unknown);
        assert_eq!(read.num_texture_units(), 0);
    }
}
