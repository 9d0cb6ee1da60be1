//! Builder and results for `rrd_graph_v`.
//!
//! A [`Grapher`] renders to the in-memory file name `-`, so librrd returns
//! the image as an `image` blob in the info list along with geometry and
//! `PRINT` results. [`GraphInfo::from_info`] picks those apart.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::args::{ArgVec, escape_colons};
use crate::error::Result;
use crate::info::Info;
use crate::schema::ConsolidationFn;

/// Output image format (`-a`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    /// Portable Network Graphics.
    #[default]
    Png,
    /// Scalable Vector Graphics.
    Svg,
    /// Encapsulated PostScript.
    Eps,
    /// Portable Document Format.
    Pdf,
}

impl ImageFormat {
    /// The name librrd expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Svg => "SVG",
            Self::Eps => "EPS",
            Self::Pdf => "PDF",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending graph.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use rrdshim::graph::Grapher;
/// use rrdshim::schema::ConsolidationFn;
///
/// let mut graph = Grapher::new();
/// graph
///     .set_title("Load")
///     .set_size(400, 100)
///     .def("load", Path::new("load.rrd"), "shortterm", ConsolidationFn::Average)
///     .line(1.0, "load", "ff0000", "1 min");
///
/// let argv = graph.args(-3600, 0, None).unwrap();
/// assert_eq!(
///     argv.iter().collect::<Vec<_>>(),
///     [
///         "graph", "-", "-s", "-3600", "-e", "0",
///         "-t", "Load", "-w", "400", "-h", "100",
///         "DEF:load=load.rrd:shortterm:AVERAGE",
///         "LINE1:load#ff0000:1 min",
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grapher {
    title: Option<String>,
    vertical_label: Option<String>,
    size: Option<(u32, u32)>,
    lower_limit: Option<f64>,
    upper_limit: Option<f64>,
    rigid: bool,
    image_format: Option<ImageFormat>,
    daemon: Option<String>,
    elements: Vec<String>,
}

impl Grapher {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Title above the graph.
    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    /// Label along the y-axis.
    pub fn set_vertical_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.vertical_label = Some(label.into());
        self
    }

    /// Size of the drawing area in pixels.
    pub fn set_size(&mut self, width: u32, height: u32) -> &mut Self {
        self.size = Some((width, height));
        self
    }

    /// Lower end of the y-axis.
    pub fn set_lower_limit(&mut self, limit: f64) -> &mut Self {
        self.lower_limit = Some(limit);
        self
    }

    /// Upper end of the y-axis.
    pub fn set_upper_limit(&mut self, limit: f64) -> &mut Self {
        self.upper_limit = Some(limit);
        self
    }

    /// Keeps the y-axis within the limits even if values exceed them.
    pub fn set_rigid(&mut self, rigid: bool) -> &mut Self {
        self.rigid = rigid;
        self
    }

    /// Image format; librrd defaults to PNG.
    pub fn set_image_format(&mut self, format: ImageFormat) -> &mut Self {
        self.image_format = Some(format);
        self
    }

    /// Reads through an rrdcached daemon.
    pub fn set_daemon(&mut self, address: impl Into<String>) -> &mut Self {
        self.daemon = Some(address.into());
        self
    }

    /// `DEF:vname=path:ds:CF`.
    pub fn def(&mut self, vname: &str, path: &Path, ds: &str, cf: ConsolidationFn) -> &mut Self {
        self.elements.push(format!(
            "DEF:{vname}={}:{ds}:{cf}",
            escape_colons(&path.to_string_lossy())
        ));
        self
    }

    /// `CDEF:vname=rpn`.
    pub fn cdef(&mut self, vname: &str, rpn: &str) -> &mut Self {
        self.elements.push(format!("CDEF:{vname}={rpn}"));
        self
    }

    /// `VDEF:vname=rpn`.
    pub fn vdef(&mut self, vname: &str, rpn: &str) -> &mut Self {
        self.elements.push(format!("VDEF:{vname}={rpn}"));
        self
    }

    /// `PRINT:vname:format`; the result lands in [`GraphInfo::print`].
    pub fn print(&mut self, vname: &str, format: &str) -> &mut Self {
        self.elements.push(format!("PRINT:{vname}:{format}"));
        self
    }

    /// `GPRINT:vname:format`, drawn into the legend.
    pub fn gprint(&mut self, vname: &str, format: &str) -> &mut Self {
        self.elements.push(format!("GPRINT:{vname}:{format}"));
        self
    }

    /// `LINE<width>:vname#color[:legend]`.
    pub fn line(&mut self, width: f64, vname: &str, color: &str, legend: &str) -> &mut Self {
        self.elements
            .push(with_legend(format!("LINE{width}:{vname}#{color}"), legend));
        self
    }

    /// `AREA:vname#color[:legend]`.
    pub fn area(&mut self, vname: &str, color: &str, legend: &str) -> &mut Self {
        self.elements
            .push(with_legend(format!("AREA:{vname}#{color}"), legend));
        self
    }

    /// `COMMENT:text`.
    pub fn comment(&mut self, text: &str) -> &mut Self {
        self.elements
            .push(format!("COMMENT:{}", escape_colons(text)));
        self
    }

    /// The elements added so far.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// Renders the argument vector for `[start, end]`.
    ///
    /// `default_daemon` applies when the graph sets none of its own.
    ///
    /// # Errors
    ///
    /// Returns an argument error if an option or element contains a NUL
    /// byte.
    pub fn args(&self, start: i64, end: i64, default_daemon: Option<&str>) -> Result<ArgVec> {
        let mut argv = ArgVec::from_args([
            "graph".to_string(),
            "-".to_string(),
            "-s".to_string(),
            start.to_string(),
            "-e".to_string(),
            end.to_string(),
        ])?;

        if let Some(title) = &self.title {
            argv.push("-t")?;
            argv.push(title)?;
        }
        if let Some(label) = &self.vertical_label {
            argv.push("-v")?;
            argv.push(label)?;
        }
        if let Some((width, height)) = self.size {
            argv.push("-w")?;
            argv.push(&width.to_string())?;
            argv.push("-h")?;
            argv.push(&height.to_string())?;
        }
        if let Some(lower) = self.lower_limit {
            argv.push("-l")?;
            argv.push(&lower.to_string())?;
        }
        if let Some(upper) = self.upper_limit {
            argv.push("-u")?;
            argv.push(&upper.to_string())?;
        }
        if self.rigid {
            argv.push("-r")?;
        }
        if let Some(format) = self.image_format {
            argv.push("-a")?;
            argv.push(format.as_str())?;
        }
        if let Some(daemon) = self.daemon.as_deref().or(default_daemon) {
            argv.push("--daemon")?;
            argv.push(daemon)?;
        }
        for element in &self.elements {
            argv.push(element)?;
        }
        Ok(argv)
    }
}

fn with_legend(mut element: String, legend: &str) -> String {
    if !legend.is_empty() {
        element.push(':');
        element.push_str(&escape_colons(legend));
    }
    element
}

/// What librrd reported about a rendered graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphInfo {
    /// Results of `PRINT` elements, in element order.
    pub print: Vec<String>,
    /// Width of the whole image in pixels.
    pub image_width: Option<u64>,
    /// Height of the whole image in pixels.
    pub image_height: Option<u64>,
    /// Offset of the drawing area from the left edge.
    pub graph_left: Option<u64>,
    /// Offset of the drawing area from the top edge.
    pub graph_top: Option<u64>,
    /// Width of the drawing area.
    pub graph_width: Option<u64>,
    /// Height of the drawing area.
    pub graph_height: Option<u64>,
    /// Start of the graphed range, seconds since the epoch.
    pub graph_start: Option<u64>,
    /// End of the graphed range.
    pub graph_end: Option<u64>,
    /// Lowest value on the y-axis.
    pub value_min: Option<f64>,
    /// Highest value on the y-axis.
    pub value_max: Option<f64>,
    /// The encoded image.
    #[serde(skip)]
    pub image: Vec<u8>,
}

impl GraphInfo {
    /// Extracts graph results from an info list returned by `rrd_graph_v`.
    pub fn from_info(info: &Info) -> Self {
        let count = |key: &str| info.get(key).and_then(|v| v.as_u64());
        let value = |key: &str| info.get(key).and_then(|v| v.as_f64());

        let mut print: Vec<(usize, String)> = info
            .iter()
            .filter_map(|(key, value)| {
                let index = key.strip_prefix("print[")?.strip_suffix(']')?.parse().ok()?;
                Some((index, value.as_str()?.to_string()))
            })
            .collect();
        print.sort_by_key(|(index, _)| *index);

        Self {
            print: print.into_iter().map(|(_, line)| line).collect(),
            image_width: count("image_width"),
            image_height: count("image_height"),
            graph_left: count("graph_left"),
            graph_top: count("graph_top"),
            graph_width: count("graph_width"),
            graph_height: count("graph_height"),
            graph_start: count("graph_start"),
            graph_end: count("graph_end"),
            value_min: value("value_min"),
            value_max: value("value_max"),
            image: info
                .get("image")
                .and_then(|v| v.as_bytes())
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::InfoValue;

    #[test]
    fn test_options_render_in_order() {
        let mut graph = Grapher::new();
        graph
            .set_vertical_label("req/s")
            .set_lower_limit(0.0)
            .set_upper_limit(100.5)
            .set_rigid(true)
            .set_image_format(ImageFormat::Svg)
            .set_daemon("unix:/run/rrdcached.sock");

        let argv = graph.args(10, 20, Some("ignored:42217")).unwrap();
        let args: Vec<_> = argv.iter().collect();
        assert_eq!(
            args[6..],
            [
                "-v", "req/s", "-l", "0", "-u", "100.5", "-r", "-a", "SVG", "--daemon",
                "unix:/run/rrdcached.sock",
            ]
        );
    }

    #[test]
    fn test_default_daemon() {
        let graph = Grapher::new();
        let argv = graph.args(0, 1, Some("localhost:42217")).unwrap();
        assert_eq!(
            argv.iter().skip(6).collect::<Vec<_>>(),
            ["--daemon", "localhost:42217"]
        );
    }

    #[test]
    fn test_elements() {
        let mut graph = Grapher::new();
        graph
            .def("in", Path::new("net.rrd"), "in", ConsolidationFn::Average)
            .cdef("bits", "in,8,*")
            .vdef("peak", "bits,MAXIMUM")
            .print("peak", "%6.2lf")
            .gprint("peak", "max %6.2lf")
            .area("bits", "00ff0080", "")
            .line(2.5, "bits", "0000ff", "traffic")
            .comment("updated 12:00");

        assert_eq!(
            graph.elements(),
            [
                "DEF:in=net.rrd:in:AVERAGE",
                "CDEF:bits=in,8,*",
                "VDEF:peak=bits,MAXIMUM",
                "PRINT:peak:%6.2lf",
                "GPRINT:peak:max %6.2lf",
                "AREA:bits#00ff0080",
                "LINE2.5:bits#0000ff:traffic",
                "COMMENT:updated 12\\:00",
            ]
        );
    }

    #[test]
    fn test_graph_info_from_info() {
        let info = Info::from_entries([
            ("graph_left", InfoValue::Count(51)),
            ("image_width", InfoValue::Count(481)),
            ("value_min", InfoValue::Value(0.0)),
            ("value_max", InfoValue::Value(2.5)),
            ("print[1]", InfoValue::Str("second".to_string())),
            ("print[0]", InfoValue::Str("first".to_string())),
            ("print[x]", InfoValue::Str("ignored".to_string())),
            ("image", InfoValue::Blob(vec![0x89, b'P', b'N', b'G'])),
        ]);

        let graph = GraphInfo::from_info(&info);
        assert_eq!(graph.print, ["first", "second"]);
        assert_eq!(graph.image_width, Some(481));
        assert_eq!(graph.graph_left, Some(51));
        assert_eq!(graph.image_height, None);
        assert_eq!(graph.value_max, Some(2.5));
        assert_eq!(graph.image, [0x89, b'P', b'N', b'G']);
    }
}
