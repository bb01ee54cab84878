use {
  crate::{
    app::Demo, arguments::Arguments, checkpoint::*,
    config::*, dataset::Dataset, error::*, math::*,
    network::Network, pipeline::*, preprocess::*, report::*, resnet::*,
    subcommand::Subcommand, vocabulary::*,
  },
  anyhow::{bail, Context},
  clap::Parser,
  eframe::{
    egui::{self, Color32, ColorImage, TextureHandle, TextureOptions},
    NativeOptions,
  },
  image::{
    imageops::{self, FilterType},
    DynamicImage, GenericImageView,
  },
  indicatif::{ProgressBar, ProgressStyle},
  ndarray::{
    Array, Array1, Array2, Array4, ArrayD, ArrayView, ArrayView1, ArrayView2,
    ArrayView3, ArrayView4, Axis, Dimension, Ix1, Ix2, Ix4,
  },
  ndarray_rand::{rand_distr::Uniform, RandomExt},
  rand::{rngs::StdRng, SeedableRng},
  rayon::prelude::*,
  serde::{Deserialize, Serialize},
  std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt::{self, Display, Formatter},
    fs::{self, File},
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
    process,
    sync::{
      mpsc::{self, Receiver, TryRecvError},
      Arc,
    },
  },
  tracing::{debug, info, warn},
  tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
  },
};

mod app;
mod arguments;
mod checkpoint;
mod config;
mod dataset;
mod error;
mod math;
mod network;
mod pipeline;
mod preprocess;
mod report;
mod resnet;
mod subcommand;
mod vocabulary;

type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;

fn main() {
  tracing_subscriber::registry()
    .with(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  if let Err(error) = Arguments::parse().run() {
    eprintln!("error: {error:#}");
    process::exit(1);
  }
}
