use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vesselstudy_pipeline::RunKind;

#[derive(Parser, Debug)]
#[command(
    name = "vesselstudy",
    version,
    about = "Post-processing and verification of vessel wall simulation studies"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    pub output: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    Forward,
    Inverse,
}

impl From<KindArg> for RunKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Forward => RunKind::Forward,
            KindArg::Inverse => RunKind::Inverse,
        }
    }
}

/// Mesh and partitions shared by the commands that need geometry.
#[derive(Args, Debug, Clone)]
pub struct GeometryArgs {
    #[arg(long, help = "Directory holding the converted mesh")]
    pub mesh_dir: PathBuf,

    #[arg(long, default_value = "mesh", help = "Base name of the mesh files")]
    pub mesh_name: String,

    #[arg(long, help = "Elements of the centerline partition")]
    pub centerline_elements: Option<usize>,

    #[arg(long, default_value = "CL")]
    pub centerline_prefix: String,

    #[arg(long, help = "Elements of the material partition")]
    pub material_elements: Option<usize>,

    #[arg(long, default_value = "DL")]
    pub material_prefix: String,

    #[arg(
        long,
        conflicts_with_all = ["centerline_elements", "material_elements"],
        help = "Prebuilt centerline support file"
    )]
    pub centerline_support: Option<PathBuf>,

    #[arg(
        long,
        conflicts_with_all = ["centerline_elements", "material_elements"],
        help = "Prebuilt material support file"
    )]
    pub material_support: Option<PathBuf>,
}

impl GeometryArgs {
    pub fn uses_support_files(&self) -> bool {
        self.centerline_support.is_some() || self.material_support.is_some()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "List the timesteps of a variable")]
    Index {
        #[arg(help = "Run directory")]
        dir: PathBuf,

        #[arg(help = "Variable name")]
        variable: String,
    },

    #[command(about = "Run or resume the stage pipeline of one run directory")]
    Run {
        #[arg(value_enum)]
        kind: KindArg,

        #[arg(help = "Run directory")]
        run_dir: PathBuf,

        #[arg(long, help = "Run name, defaults to the directory name")]
        name: Option<String>,

        #[command(flatten)]
        geometry: GeometryArgs,

        #[arg(long, help = "Solver executable")]
        solver: String,

        #[arg(long = "solver-arg", help = "Argument placed before the job file")]
        solver_args: Vec<String>,

        #[arg(long, help = "Exporter executable")]
        exporter: Option<String>,

        #[arg(long, help = "Forward run the inverse reference data is built from")]
        reference_source: Option<PathBuf>,

        #[arg(long, help = "Recompute stages whose outputs already exist")]
        force: bool,

        #[arg(short = 'j', long, help = "Worker threads")]
        concurrency: Option<usize>,
    },

    #[command(about = "Synthesize inverse reference data from a forward run")]
    Reference {
        #[arg(help = "Forward run directory")]
        forward_dir: PathBuf,

        #[arg(help = "Output directory")]
        out_dir: PathBuf,

        #[command(flatten)]
        geometry: GeometryArgs,
    },

    #[command(about = "Shift the onset of a tracking series")]
    Retime {
        #[arg(help = "Directory of the raw series")]
        raw_dir: PathBuf,

        #[arg(help = "Output directory")]
        out_dir: PathBuf,

        #[arg(help = "Variable name")]
        variable: String,

        #[arg(long, help = "Onset as a fraction of the final step")]
        target: Option<f64>,
    },

    #[command(subcommand, about = "Convergence and noise studies")]
    Verify(VerifyCommands),

    #[command(about = "Write a default configuration file")]
    InitConfig {
        #[arg(default_value = ".vesselstudy.toml")]
        path: PathBuf,

        #[arg(short, long, help = "Overwrite an existing file")]
        force: bool,
    },
}

/// Location of a study tree.
#[derive(Args, Debug, Clone)]
pub struct StudyArgs {
    #[arg(long, help = "Root of the study tree")]
    pub root: PathBuf,

    #[arg(long, help = "Geometry tag, e.g. straight")]
    pub shape: String,

    #[arg(long, help = "Material mode tag, e.g. grad")]
    pub mode: String,

    #[arg(long, value_delimiter = ',', help = "Refinement levels")]
    pub refinements: Option<Vec<usize>>,
}

#[derive(Subcommand, Debug)]
pub enum VerifyCommands {
    #[command(about = "L2 error against forward runs of the same refinement")]
    L2 {
        #[command(flatten)]
        study: StudyArgs,

        #[arg(long, value_delimiter = ',', default_value = "U0,Ut")]
        variables: Vec<String>,
    },

    #[command(about = "Centerline-weighted error against the finest forward run")]
    Weighted {
        #[command(flatten)]
        study: StudyArgs,

        #[arg(long, help = "Directory with CenterLineField-0 and CenterNormalField-0")]
        mesh_dir: PathBuf,

        #[arg(long, value_delimiter = ',', default_value = "U0,Ut")]
        variables: Vec<String>,
    },

    #[command(about = "Relative errors of noisy runs")]
    Noise {
        #[command(flatten)]
        study: StudyArgs,

        #[arg(long)]
        mesh_dir: PathBuf,

        #[arg(long, help = "Spatial frequency of the noise")]
        freq: u32,

        #[arg(long, help = "Noise magnitude tag, e.g. 0.5")]
        mag: String,
    },
}
