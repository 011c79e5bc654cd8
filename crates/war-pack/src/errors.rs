use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Configuration file not found")]
    #[diagnostic(
        code(config::not_found),
        help("Create a war.config.json or war.config.toml file in your project directory")
    )]
    ConfigNotFound { search_path: Utf8PathBuf },

    #[error("Configuration file error")]
    #[diagnostic(
        code(config::parse_error),
        help("Check your war.config.json or war.config.toml file for syntax errors")
    )]
    ConfigParseError {
        #[source]
        source: war_project::ProjectError,
    },

    #[error("Invalid packaging configuration")]
    #[diagnostic(
        code(config::invalid),
        help("Overlay ids must be unique, every overlay must match a dependency with a resolved file, and filtering delimiters and encodings must be supported")
    )]
    InvalidConfiguration {
        #[source]
        source: war_overlay::Error,
    },

    #[error("Missing WEB-INF/web.xml")]
    #[diagnostic(
        code(package::missing_web_xml),
        help("Add src/main/webapp/WEB-INF/web.xml, set war.web_xml, or set war.fail_on_missing_web_xml = false")
    )]
    MissingWebXml,

    #[error("Packaging failed")]
    #[diagnostic(code(package::failed))]
    PackagingFailed {
        #[source]
        source: war_overlay::Error,
    },

    #[error("Path is not valid UTF-8: {path}")]
    #[diagnostic(code(fs::non_utf8_path))]
    NonUtf8Path { path: String },
}

impl CliError {
    pub fn config_not_found(search_path: Utf8PathBuf) -> Self {
        Self::ConfigNotFound { search_path }
    }

    pub fn non_utf8_path(path: impl Into<String>) -> Self {
        Self::NonUtf8Path { path: path.into() }
    }
}

impl From<war_project::ProjectError> for CliError {
    fn from(source: war_project::ProjectError) -> Self {
        match source {
            war_project::ProjectError::ConfigNotFound(path) => Self::config_not_found(path),
            source => Self::ConfigParseError { source },
        }
    }
}

impl From<war_overlay::Error> for CliError {
    fn from(source: war_overlay::Error) -> Self {
        match source {
            war_overlay::Error::MissingWebXml => Self::MissingWebXml,
            source if source.is_configuration() => Self::InvalidConfiguration { source },
            source => Self::PackagingFailed { source },
        }
    }
}
