//! Orchestration: reads recipe files, runs them through [`rootcraft::Recipe`],
//! and either prints the resulting entry table or writes it out as an archive.

use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use rootcraft::cpio::CpioSink;
use rootcraft::tar::TarSink;
use rootcraft::Format;
use rootcraft::Recipe;
use rootcraft::Settings;
use rootcraft::Sink;
use rootcraft_elf::resolver::Resolver;

use crate::print;

/// Errors this binary can report, beyond what `rootcraft`/`rootcraft-elf` raise.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// Propagated from recipe parsing/resolution.
    #[error(transparent)]
    Recipe(#[from] rootcraft::Error),
    /// Input/output error reading a recipe file or writing the archive.
    #[error("input/output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read every file in `recipe_paths`, run them through one [`Recipe`] in
/// order, and either print the entries (`settings.print_only`) or write
/// `output_path` (`-` for stdout) as an archive in `settings.format`.
pub fn run(recipe_paths: &[std::path::PathBuf], output_path: &Path, settings: Settings) -> Result<(), RunError> {
    let rootfs = settings.rootfs.clone();
    let resolver: Option<Box<dyn rootcraft::ElfResolver>> = if settings.elf_expand {
        Some(Box::new(Resolver::detect(&rootfs)))
    } else {
        None
    };

    let mut recipe = Recipe::new(settings.clone(), resolver);
    for path in recipe_paths {
        let text = fs_err::read_to_string(path)?;
        log::debug!("parsing {}", path.display());
        recipe.parse(&text)?;
    }

    let table = recipe.into_table()?;
    let entries: Vec<_> = table.into_entries();
    log::info!("{} entries", entries.len());

    if settings.print_only {
        print::list(&entries);
        return Ok(());
    }

    let writer: Box<dyn Write> = if output_path.as_os_str() == "-" {
        Box::new(std::io::stdout())
    } else {
        Box::new(BufWriter::new(fs_err::File::create(output_path)?))
    };

    let buffer_size = settings.buffer_size;
    match settings.format {
        Format::Tar => write_with(&mut TarSink::new(writer), &entries, buffer_size)?,
        Format::Cpio => write_with(&mut CpioSink::new(writer), &entries, buffer_size)?,
    }
    Ok(())
}

/// Read a regular entry's body through a [`std::io::BufReader`] sized by
/// `settings.buffer_size` rather than slurping it in one `read_to_end` call
/// with no capacity hint, so the CLI's `--buffer-size` flag has an
/// observable effect even though [`Sink::write_file`] itself takes a whole
/// body slice.
fn read_body(path: &Path, buffer_size: usize) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let file = fs_err::File::open(path)?;
    let mut reader = std::io::BufReader::with_capacity(buffer_size.max(1), file);
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    Ok(body)
}

fn write_with(sink: &mut dyn Sink, entries: &[rootcraft::Entry], buffer_size: usize) -> Result<(), RunError> {
    use rootcraft::archive::FileType;
    use rootcraft::archive::Header;
    use rootcraft::Kind;

    for entry in entries {
        let mut name = entry.dst.clone();
        if entry.kind == Kind::Directory && !name.ends_with('/') {
            name.push('/');
        }
        let header = Header {
            name,
            size: entry.data.len() as u64,
            mode: entry.mode,
            uid: entry.user,
            gid: entry.group,
            mtime: entry.time,
            file_type: match entry.kind {
                Kind::Directory => FileType::Directory,
                Kind::Symlink => FileType::Symlink,
                _ => FileType::Regular,
            },
            link_target: if entry.kind == Kind::Symlink { entry.src.clone() } else { String::new() },
        };
        match entry.kind {
            Kind::Directory | Kind::Symlink => sink.write_header(&header)?,
            Kind::Create | Kind::CreateNoEndl => sink.write_file(&header, &entry.data)?,
            Kind::Base64 => {
                use base64::Engine;
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(String::from_utf8_lossy(&entry.data).trim())
                    .map_err(|e| RunError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
                let mut header = header;
                header.size = decoded.len() as u64;
                sink.write_file(&header, &decoded)?;
            }
            _ => {
                let body = read_body(Path::new(&entry.src), buffer_size)?;
                let mut header = header;
                header.size = body.len() as u64;
                sink.write_file(&header, &body)?;
            }
        }
    }
    sink.close()?;
    Ok(())
}
