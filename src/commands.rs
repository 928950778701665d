pub mod parameters {
    use crate::output;
    use crate::parameters::Parameter;

    /// List the parameters an interrogation can report.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Only list parameters whose name or set contains this text.
        filter: Option<String>,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not set up the output")]
        Output(#[source] output::Error),
        #[error("could not write the parameter list")]
        Write(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct ParameterSchema {
        pub set: &'static str,
        pub identity: &'static str,
        pub name: String,
    }

    impl ParameterSchema {
        pub fn all_parameters() -> impl Iterator<Item = Self> {
            Parameter::all().map(|p| ParameterSchema {
                set: <&'static str>::from(p.set()),
                identity: p.identity(),
                name: p.display_name(),
            })
        }

        pub fn is_match(&self, pattern: &str) -> bool {
            let pattern = pattern.to_lowercase();
            [self.set, self.identity, self.name.as_str()]
                .iter()
                .any(|field| field.to_lowercase().contains(&pattern))
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.header(&["Set", "Parameter", "Identity"]).map_err(Error::Write)?;
        let matching = ParameterSchema::all_parameters()
            .filter(|p| args.filter.as_deref().is_none_or(|pattern| p.is_match(pattern)));
        for parameter in matching {
            output
                .row(
                    || vec![
                        parameter.set.to_string(),
                        parameter.name.clone(),
                        parameter.identity.to_string(),
                    ],
                    || &parameter,
                )
                .map_err(Error::Write)?;
        }
        output.commit().map_err(Error::Write)
    }

}

pub mod info {
    use std::path::PathBuf;

    use crate::descriptor::DeviceDescriptor;
    use crate::device_image::{self, DeviceImage};
    use crate::interrogate::{self, Options};
    use crate::output;
    use crate::sink::{ResultItem, ResultSink};

    /// Interrogate a device and show everything it reports about itself.
    #[derive(clap::Parser)]
    pub struct Args {
        /// JSON image of the device to interrogate.
        image: PathBuf,
        /// Treat the device as having this device descriptor (mask version), e.g. `0x07B0`.
        #[arg(long)]
        descriptor: Option<DeviceDescriptor>,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not load the device")]
        Load(#[source] device_image::Error),
        #[error("could not set up the output")]
        Output(#[source] output::Error),
        #[error("could not interrogate the device")]
        Interrogate(#[source] interrogate::Error),
        #[error("could not write the results")]
        Write(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut device = DeviceImage::load(&args.image).map_err(Error::Load)?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.header(&["Category", "Parameter", "Value", "Raw"]).map_err(Error::Write)?;
        let mut write_error = None;
        let mut sink = ResultSink::forwarding(|item: ResultItem| {
            if write_error.is_some() {
                return;
            }
            let cells = || {
                vec![
                    item.category.clone(),
                    item.parameter.to_string(),
                    item.value.clone(),
                    item.raw_hex(),
                ]
            };
            if let Err(e) = output.row(cells, || &item) {
                write_error = Some(e);
            }
        });
        let options = Options { descriptor: args.descriptor };
        let result = interrogate::interrogate(&mut device, &options, &mut sink);
        drop(sink);
        result.map_err(Error::Interrogate)?;
        if let Some(e) = write_error {
            return Err(Error::Write(e));
        }
        output.commit().map_err(Error::Write)
    }
}
