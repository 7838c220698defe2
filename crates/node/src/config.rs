//! Node configuration: `paydayd.conf` plus command-line overrides.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use paydayd_assets::{AllocationTuple, AssetConfig, BridgeSettings, IndexKey, ZdagPolicy};
use paydayd_consensus::params::Network;
use paydayd_consensus::Hash256;
use paydayd_log::{Category, Format, Level, LogConfig};

use crate::store::Backend;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const CONF_FILE_NAME: &str = "paydayd.conf";

type ConfMap = HashMap<String, Vec<String>>;

#[derive(Clone, Debug)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub conf_path: PathBuf,
    pub network: Network,
    pub log: LogConfig,
    pub assets: AssetConfig,
    pub bridge: BridgeSettings,
    pub db_cache_bytes: Option<u64>,
}

/// What the process does once the store is open.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Startup maintenance: overlay restore and resync, null-allocation
    /// pruning and the external root audit.
    Maintain,
    GetAsset(u32),
    ListAssets,
    GetAssetAllocation(AllocationTuple),
    ListAssetAllocations(u32),
    SenderStatus(AllocationTuple),
    TxStatus(AllocationTuple, Hash256),
    History(IndexKey),
    AuditRoots,
}

#[derive(Debug)]
pub enum CliAction {
    Run(Box<Config>, Command),
    PrintHelp,
    PrintVersion,
}

pub fn parse_args() -> Result<CliAction, String> {
    parse_args_from(std::env::args().skip(1))
}

fn missing(flag: &str) -> String {
    format!("missing value for {flag}\n{}", usage())
}

fn parse_guid(raw: &str) -> Result<u32, String> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid asset guid '{raw}'"))
}

fn parse_tuple(raw: &str) -> Result<AllocationTuple, String> {
    AllocationTuple::parse(raw)
        .ok_or_else(|| format!("invalid allocation '{raw}' (expected <guid>-<address>)"))
}

fn parse_command<I>(name: &str, args: &mut std::iter::Peekable<I>) -> Result<Command, String>
where
    I: Iterator<Item = String>,
{
    let mut operand = |what: &str| {
        args.next()
            .ok_or_else(|| format!("{name} requires {what}\n{}", usage()))
    };
    let command = match name {
        "maintain" => Command::Maintain,
        "getasset" => Command::GetAsset(parse_guid(&operand("a guid")?)?),
        "listassets" => Command::ListAssets,
        "getassetallocation" => Command::GetAssetAllocation(parse_tuple(&operand("an allocation")?)?),
        "listassetallocations" => Command::ListAssetAllocations(parse_guid(&operand("a guid")?)?),
        "assetallocationsenderstatus" => {
            Command::SenderStatus(parse_tuple(&operand("an allocation")?)?)
        }
        "assetallocationtxstatus" => {
            let tuple = parse_tuple(&operand("an allocation")?)?;
            let raw = operand("a txid")?;
            let txid = paydayd_primitives::hash_from_hex(&raw)
                .ok_or_else(|| format!("invalid txid '{raw}'"))?;
            Command::TxStatus(tuple, txid)
        }
        "assethistory" => {
            let raw = operand("a guid or allocation")?;
            if raw.contains('-') {
                Command::History(IndexKey::Allocation(parse_tuple(&raw)?))
            } else {
                Command::History(IndexKey::Asset(parse_guid(&raw)?))
            }
        }
        "auditroots" => Command::AuditRoots,
        other => return Err(format!("unknown command '{other}'\n{}", usage())),
    };
    Ok(command)
}

pub fn parse_args_from<I>(raw_args: I) -> Result<CliAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut backend = Backend::Fjall;
    let mut backend_set = false;
    let mut data_dir: Option<PathBuf> = None;
    let mut conf_path: Option<PathBuf> = None;
    let mut network = Network::Mainnet;
    let mut network_set = false;
    let mut log_level: Option<Level> = None;
    let mut log_format: Option<Format> = None;
    let mut log_timestamps: Option<bool> = None;
    let mut categories: Option<u32> = None;
    let mut settle_ms: Option<i64> = None;
    let mut expiry_ms: Option<i64> = None;
    let mut asset_index: Option<bool> = None;
    let mut asset_index_guids: Vec<u32> = Vec::new();
    let mut geth_testnet: Option<bool> = None;
    let mut lite_mode: Option<bool> = None;
    let mut db_cache_mb: Option<u64> = None;
    let mut command = Command::Maintain;

    let mut args = raw_args.into_iter().peekable();
    if let Some(first) = args.peek().cloned() {
        if !first.starts_with('-') {
            let _ = args.next();
            match first.as_str() {
                "help" => return Ok(CliAction::PrintHelp),
                "version" => return Ok(CliAction::PrintVersion),
                name => command = parse_command(name, &mut args)?,
            }
        }
    }

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::PrintHelp),
            "--version" => return Ok(CliAction::PrintVersion),
            "--backend" => {
                let value = args.next().ok_or_else(|| missing("--backend"))?;
                backend = Backend::parse(&value)
                    .ok_or_else(|| format!("invalid backend '{value}'\n{}", usage()))?;
                backend_set = true;
            }
            "--data-dir" | "--datadir" => {
                let value = args.next().ok_or_else(|| missing("--data-dir"))?;
                data_dir = Some(PathBuf::from(value));
            }
            "--conf" => {
                let value = args.next().ok_or_else(|| missing("--conf"))?;
                conf_path = Some(PathBuf::from(value));
            }
            "--network" => {
                let value = args.next().ok_or_else(|| missing("--network"))?;
                network = parse_network(&value)
                    .ok_or_else(|| format!("invalid network '{value}'\n{}", usage()))?;
                network_set = true;
            }
            "--testnet" => {
                network = Network::Testnet;
                network_set = true;
            }
            "--regtest" => {
                network = Network::Regtest;
                network_set = true;
            }
            "--log-level" | "--loglevel" => {
                let value = args.next().ok_or_else(|| missing("--log-level"))?;
                log_level = Some(
                    Level::parse(&value)
                        .ok_or_else(|| format!("invalid log level '{value}'\n{}", usage()))?,
                );
            }
            "--log-format" | "--logformat" => {
                let value = args.next().ok_or_else(|| missing("--log-format"))?;
                log_format = Some(
                    Format::parse(&value)
                        .ok_or_else(|| format!("invalid log format '{value}'\n{}", usage()))?,
                );
            }
            "--log-timestamps" | "--logtimestamps" => log_timestamps = Some(true),
            "--no-log-timestamps" | "--no-logtimestamps" => log_timestamps = Some(false),
            "--debug" => {
                let value = args.next().ok_or_else(|| missing("--debug"))?;
                categories = Some(Category::parse_list(&value)?);
            }
            "--zdag-settle-ms" => {
                let value = args.next().ok_or_else(|| missing("--zdag-settle-ms"))?;
                settle_ms = Some(parse_millis(&value, "--zdag-settle-ms")?);
            }
            "--zdag-expiry-ms" => {
                let value = args.next().ok_or_else(|| missing("--zdag-expiry-ms"))?;
                expiry_ms = Some(parse_millis(&value, "--zdag-expiry-ms")?);
            }
            "--asset-index" | "--assetindex" => asset_index = Some(true),
            "--asset-index-guid" => {
                let value = args.next().ok_or_else(|| missing("--asset-index-guid"))?;
                asset_index_guids.push(parse_guid(&value)?);
            }
            "--geth-testnet" | "--gethtestnet" => geth_testnet = Some(true),
            "--lite-mode" | "--litemode" => lite_mode = Some(true),
            "--db-cache-mb" | "--dbcache" => {
                let value = args.next().ok_or_else(|| missing("--db-cache-mb"))?;
                db_cache_mb = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid db cache '{value}'\n{}", usage()))?,
                );
            }
            other => return Err(format!("unknown argument '{other}'\n{}", usage())),
        }
    }

    let explicit_conf = conf_path.is_some();
    let mut conf_file = conf_path.unwrap_or_else(|| {
        data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
            .join(CONF_FILE_NAME)
    });
    let conf = load_conf(&conf_file)?.unwrap_or_default();
    if explicit_conf && !conf_file.exists() {
        return Err(format!("config file {} not found", conf_file.display()));
    }

    if data_dir.is_none() {
        data_dir = conf_last(&conf, "datadir").map(PathBuf::from);
    }
    let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    if !explicit_conf {
        conf_file = data_dir.join(CONF_FILE_NAME);
    }

    if !network_set {
        if conf_flag(&conf, "regtest", &conf_file)? == Some(true) {
            network = Network::Regtest;
        } else if conf_flag(&conf, "testnet", &conf_file)? == Some(true) {
            network = Network::Testnet;
        }
    }
    if !backend_set {
        if let Some(raw) = conf_last(&conf, "backend") {
            backend = Backend::parse(raw).ok_or_else(|| {
                format!("invalid backend '{raw}' in {}", conf_file.display())
            })?;
        }
    }

    let mut log = LogConfig::default();
    log.level = match log_level {
        Some(level) => level,
        None => conf_value(&conf, "loglevel", &conf_file, Level::parse)?.unwrap_or(log.level),
    };
    log.format = match log_format {
        Some(format) => format,
        None => conf_value(&conf, "logformat", &conf_file, Format::parse)?.unwrap_or(log.format),
    };
    log.timestamps = match log_timestamps {
        Some(enabled) => enabled,
        None => conf_flag(&conf, "logtimestamps", &conf_file)?.unwrap_or(log.timestamps),
    };
    log.categories = match categories {
        Some(mask) => mask,
        None => {
            let mut mask = 0;
            for raw in conf.get("debug").into_iter().flatten() {
                mask |= Category::parse_list(raw)
                    .map_err(|err| format!("{err} in {}", conf_file.display()))?;
            }
            mask
        }
    };
    if log.categories != 0 && log_level.is_none() && log.level < Level::Debug {
        log.level = Level::Debug;
    }

    let mut zdag = ZdagPolicy::default();
    zdag.settle_ms = match settle_ms {
        Some(value) => value,
        None => conf_parsed(&conf, "zdagsettlems", &conf_file)?.unwrap_or(zdag.settle_ms),
    };
    zdag.expiry_ms = match expiry_ms {
        Some(value) => value,
        None => conf_parsed(&conf, "zdagexpiryms", &conf_file)?.unwrap_or(zdag.expiry_ms),
    };
    if zdag.settle_ms < 0 || zdag.expiry_ms <= 0 {
        return Err("zdag timings must be positive".to_string());
    }

    let asset_index = match asset_index {
        Some(enabled) => enabled,
        None => conf_flag(&conf, "assetindex", &conf_file)?.unwrap_or(false),
    };
    for raw in conf.get("assetindexguids").into_iter().flatten() {
        for part in raw.split(',').filter(|part| !part.trim().is_empty()) {
            let guid = parse_guid(part)
                .map_err(|err| format!("{err} in {}", conf_file.display()))?;
            if !asset_index_guids.contains(&guid) {
                asset_index_guids.push(guid);
            }
        }
    }

    let bridge = BridgeSettings {
        geth_testnet: match geth_testnet {
            Some(enabled) => enabled,
            None => conf_flag(&conf, "gethtestnet", &conf_file)?.unwrap_or(false),
        },
        lite_mode: match lite_mode {
            Some(enabled) => enabled,
            None => conf_flag(&conf, "litemode", &conf_file)?.unwrap_or(false),
        },
    };

    let db_cache_mb = match db_cache_mb {
        Some(mb) => Some(mb),
        None => conf_parsed::<u64>(&conf, "dbcache", &conf_file)?,
    };

    let mut unsupported: Vec<&str> = conf
        .keys()
        .map(String::as_str)
        .filter(|key| !SUPPORTED_CONF_KEYS.contains(key))
        .collect();
    if !unsupported.is_empty() {
        unsupported.sort_unstable();
        paydayd_log::log_warn!(
            "Warning: ignoring unsupported keys in {}: {}",
            conf_file.display(),
            unsupported.join(", ")
        );
    }

    Ok(CliAction::Run(
        Box::new(Config {
            backend,
            data_dir,
            conf_path: conf_file,
            network,
            log,
            assets: AssetConfig {
                asset_index,
                asset_index_guids,
                zdag,
            },
            bridge,
            db_cache_bytes: db_cache_mb.map(|mb| mb.saturating_mul(1024 * 1024)),
        }),
        command,
    ))
}

const SUPPORTED_CONF_KEYS: &[&str] = &[
    "testnet",
    "regtest",
    "backend",
    "datadir",
    "loglevel",
    "logformat",
    "logtimestamps",
    "debug",
    "zdagsettlems",
    "zdagexpiryms",
    "assetindex",
    "assetindexguids",
    "gethtestnet",
    "litemode",
    "dbcache",
];

fn parse_network(value: &str) -> Option<Network> {
    match value {
        "mainnet" | "main" => Some(Network::Mainnet),
        "testnet" | "test" => Some(Network::Testnet),
        "regtest" => Some(Network::Regtest),
        _ => None,
    }
}

fn parse_millis(value: &str, flag: &str) -> Result<i64, String> {
    value
        .parse::<i64>()
        .map_err(|_| format!("invalid value '{value}' for {flag}\n{}", usage()))
}

/// Reads a `key=value` conf file. Returns `None` when the file does not exist.
pub fn load_conf(path: &Path) -> Result<Option<ConfMap>, String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(format!("failed to read {}: {err}", path.display())),
    };

    let mut out = ConfMap::new();
    for raw_line in contents.lines() {
        let mut line = raw_line.trim();
        if let Some(idx) = line.find(['#', ';']) {
            line = &line[..idx];
        }
        line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line, "1"),
        };
        if key.is_empty() {
            continue;
        }
        out.entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }
    Ok(Some(out))
}

pub fn parse_conf_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Some(true);
    }
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Last value of a repeated key.
fn conf_last<'a>(conf: &'a ConfMap, key: &str) -> Option<&'a str> {
    conf.get(key)
        .and_then(|values| values.last())
        .map(String::as_str)
}

fn conf_flag(conf: &ConfMap, key: &str, path: &Path) -> Result<Option<bool>, String> {
    conf_value(conf, key, path, parse_conf_bool)
}

fn conf_parsed<T: FromStr>(conf: &ConfMap, key: &str, path: &Path) -> Result<Option<T>, String> {
    conf_value(conf, key, path, |raw| raw.parse::<T>().ok())
}

fn conf_value<T>(
    conf: &ConfMap,
    key: &str,
    path: &Path,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, String> {
    match conf_last(conf, key) {
        Some(raw) => parse(raw)
            .map(Some)
            .ok_or_else(|| format!("invalid {key} value '{raw}' in {}", path.display())),
        None => Ok(None),
    }
}

pub fn usage() -> String {
    [
        "Usage: paydayd [COMMAND] [OPTIONS]",
        "",
        "Commands:",
        "  maintain                            Restore the zdag overlay, prune empty allocations and audit external roots (default)",
        "  getasset <guid>                     Print one asset",
        "  listassets                          Print every asset",
        "  getassetallocation <guid-address>   Print one allocation",
        "  listassetallocations <guid>         Print every allocation of an asset",
        "  assetallocationsenderstatus <guid-address>",
        "                                      Print the zdag status of a sender",
        "  assetallocationtxstatus <guid-address> <txid>",
        "                                      Print the zdag status of one send",
        "  assethistory <guid|guid-address>    Print indexed transactions",
        "  auditroots                          Report external root ranges to fetch again",
        "  help | version",
        "",
        "Options:",
        "  --backend <memory|fjall>     Storage backend (default: fjall)",
        "  --data-dir <path>            Data directory (default: ./data)",
        "  --conf <path>                Config file (default: <data-dir>/paydayd.conf)",
        "  --network <mainnet|testnet|regtest>, --testnet, --regtest",
        "  --log-level <level>          error|warn|info|debug|trace",
        "  --log-format <text|json>",
        "  --log-timestamps | --no-log-timestamps",
        "  --debug <categories>         Comma list of asset,zdag,bridge,store (or all)",
        "  --zdag-settle-ms <ms>        Double-spend window of an unconfirmed send (default: 1000)",
        "  --zdag-expiry-ms <ms>        Age after which zdag arrivals are dropped (default: 1800000)",
        "  --asset-index                Keep a txid history per asset and allocation",
        "  --asset-index-guid <guid>    Restrict the history to this asset (repeatable)",
        "  --geth-testnet               Use the shallow external confirmation depth",
        "  --lite-mode                  Never require external roots",
        "  --db-cache-mb <mb>           Fjall block cache size",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn run(items: &[&str]) -> (Config, Command) {
        match parse_args_from(args(items)).expect("parse") {
            CliAction::Run(config, command) => (*config, command),
            other => panic!("unexpected action {other:?}"),
        }
    }

    fn write_conf(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(CONF_FILE_NAME);
        let mut file = fs::File::create(&path).expect("create conf");
        file.write_all(body.as_bytes()).expect("write conf");
        path
    }

    #[test]
    fn conf_bool_values() {
        assert_eq!(parse_conf_bool(""), Some(true));
        assert_eq!(parse_conf_bool("Yes"), Some(true));
        assert_eq!(parse_conf_bool("0"), Some(false));
        assert_eq!(parse_conf_bool("false"), Some(false));
        assert_eq!(parse_conf_bool("maybe"), None);
    }

    #[test]
    fn conf_file_syntax() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_conf(
            dir.path(),
            "# comment\n; another\nTestNet\nassetindexguids=700 # trailing\nassetindexguids = 800\n=orphan\n",
        );
        let conf = load_conf(&path).expect("read").expect("present");
        assert_eq!(conf.get("testnet"), Some(&vec!["1".to_string()]));
        assert_eq!(
            conf.get("assetindexguids"),
            Some(&vec!["700".to_string(), "800".to_string()])
        );
        assert_eq!(conf.len(), 2);
        assert!(load_conf(&dir.path().join("absent.conf"))
            .expect("read")
            .is_none());
    }

    #[test]
    fn defaults_without_conf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().to_string_lossy().to_string();
        let (config, command) = run(&["--data-dir", &data_dir]);
        assert_eq!(command, Command::Maintain);
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.backend, Backend::Fjall);
        assert_eq!(config.assets.zdag, ZdagPolicy::default());
        assert!(!config.assets.asset_index);
        assert_eq!(config.bridge, BridgeSettings::default());
        assert_eq!(config.db_cache_bytes, None);
        assert_eq!(config.conf_path, dir.path().join(CONF_FILE_NAME));
    }

    #[test]
    fn conf_values_apply() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_conf(
            dir.path(),
            "regtest=1\nbackend=memory\nzdagsettlems=250\nassetindex\nassetindexguids=700,800\ngethtestnet=yes\ndebug=zdag\ndbcache=64\n",
        );
        let data_dir = dir.path().to_string_lossy().to_string();
        let (config, _) = run(&["--data-dir", &data_dir]);
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.assets.zdag.settle_ms, 250);
        assert!(config.assets.asset_index);
        assert_eq!(config.assets.asset_index_guids, vec![700, 800]);
        assert!(config.bridge.geth_testnet);
        assert!(!config.bridge.lite_mode);
        assert_eq!(config.log.categories, Category::Zdag.bit());
        assert_eq!(config.log.level, Level::Debug);
        assert_eq!(config.db_cache_bytes, Some(64 * 1024 * 1024));
    }

    #[test]
    fn cli_overrides_conf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conf = write_conf(
            dir.path(),
            "testnet=1\nbackend=memory\nloglevel=warn\nzdagexpiryms=5000\nassetindexguids=700\n",
        );
        let conf = conf.to_string_lossy().to_string();
        let (config, _) = run(&[
            "--conf",
            &conf,
            "--network",
            "mainnet",
            "--backend",
            "fjall",
            "--log-level",
            "error",
            "--zdag-expiry-ms",
            "9000",
            "--asset-index-guid",
            "900",
        ]);
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.backend, Backend::Fjall);
        assert_eq!(config.log.level, Level::Error);
        assert_eq!(config.assets.zdag.expiry_ms, 9000);
        assert_eq!(config.assets.asset_index_guids, vec![900, 700]);
    }

    #[test]
    fn invalid_conf_values_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_conf(dir.path(), "litemode=sometimes\n");
        let data_dir = dir.path().to_string_lossy().to_string();
        let error = parse_args_from(args(&["--data-dir", &data_dir])).expect_err("bad bool");
        assert!(error.contains("invalid litemode value 'sometimes'"));

        write_conf(dir.path(), "zdagsettlems=-5\n");
        assert!(parse_args_from(args(&["--data-dir", &data_dir])).is_err());
    }

    #[test]
    fn explicit_conf_must_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.conf").to_string_lossy().to_string();
        assert!(parse_args_from(args(&["--conf", &missing])).is_err());
    }

    #[test]
    fn commands_and_operands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().to_string_lossy().to_string();
        let (_, command) = run(&["getasset", "700", "--data-dir", &data_dir]);
        assert_eq!(command, Command::GetAsset(700));

        let (_, command) = run(&["assethistory", "700", "--data-dir", &data_dir]);
        assert_eq!(command, Command::History(IndexKey::Asset(700)));

        assert!(parse_args_from(args(&["getasset"])).is_err());
        assert!(parse_args_from(args(&["getasset", "seven"])).is_err());
        assert!(parse_args_from(args(&["frobnicate"])).is_err());
        assert!(matches!(
            parse_args_from(args(&["help"])),
            Ok(CliAction::PrintHelp)
        ));
        assert!(matches!(
            parse_args_from(args(&["--version"])),
            Ok(CliAction::PrintVersion)
        ));
    }
}
