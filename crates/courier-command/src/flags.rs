use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CommandError, Result};

/// The marker opening a flag token.
const FLAG_MARKER: char = '-';

/// A registered flag definition.
///
/// `aliases` holds every accepted spelling (typically the canonical name plus
/// short forms). Registered once at plugin init; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFlag {
    /// Canonical name: the key under which validated arguments surface.
    pub name: String,
    /// Accepted spellings, e.g. `["tag", "t"]`.
    pub aliases: Vec<String>,
    /// Whether the flag consumes a following argument token.
    pub accepts_arg: bool,
    /// Whether more than one argument occurrence is allowed.
    pub multi_arg: bool,
    /// Mutual-exclusion group tags. Flags sharing a tag are pairwise
    /// exclusive within one validated command.
    pub me_groups: Vec<String>,
}

impl CommandFlag {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            aliases: vec![name.clone()],
            name,
            accepts_arg: false,
            multi_arg: false,
            me_groups: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_arg(mut self) -> Self {
        self.accepts_arg = true;
        self
    }

    pub fn multi(mut self) -> Self {
        self.accepts_arg = true;
        self.multi_arg = true;
        self
    }

    pub fn me_group(mut self, group: impl Into<String>) -> Self {
        self.me_groups.push(group.into());
        self
    }
}

/// Raw parse result: flag spelling -> argument occurrences, untouched by
/// validation. An empty vec means the flag was present with no argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFlags(HashMap<String, Vec<String>>);

impl ParsedFlags {
    pub fn has(&self, spelling: &str) -> bool {
        self.0.contains_key(spelling)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert_occurrence(&mut self, spelling: &str, arg: Option<&str>) {
        let entry = self.0.entry(spelling.to_string()).or_default();
        if let Some(arg) = arg {
            entry.push(arg.to_string());
        }
    }
}

/// Validated result: canonical flag name -> merged, ordered arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagValues(HashMap<String, Vec<String>>);

impl FlagValues {
    /// Whether the flag was present at all (with or without arguments).
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Arguments collected for the flag, empty when absent or argument-less.
    pub fn args(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First argument of the flag, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.args(name).first().map(String::as_str)
    }
}

/// Structural parse of a command line into raw flags.
///
/// Tokenizes with shell-style quoting; every token after the first that
/// begins with the flag marker opens a flag, and a following non-flag token
/// is consumed as that flag's single argument occurrence. Unknown names are
/// accepted here; semantic checks live in [`FlagSet::validate`], so callers
/// can inspect raw flags (a `-debug` dump) even when validation will reject
/// the command.
pub fn parse(content: &str) -> Result<ParsedFlags> {
    let tokens =
        shell_words::split(content).map_err(|e| CommandError::BadQuoting(e.to_string()))?;
    let mut parsed = ParsedFlags::default();
    // tokens[0] is the command word itself
    let mut i = 1;
    while i < tokens.len() {
        if let Some(spelling) = tokens[i].strip_prefix(FLAG_MARKER) {
            match tokens.get(i + 1) {
                Some(next) if !next.starts_with(FLAG_MARKER) => {
                    parsed.insert_occurrence(spelling, Some(next));
                    i += 1; // skip the consumed argument
                }
                _ => parsed.insert_occurrence(spelling, None),
            }
        }
        i += 1;
    }
    Ok(parsed)
}

/// The per-command flag registry, populated once at plugin init.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    by_alias: HashMap<String, Arc<CommandFlag>>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flag under all of its aliases.
    ///
    /// Re-registering the identical definition is a no-op. Two *different*
    /// definitions claiming the same alias is a wiring bug, caught at
    /// startup: this panics rather than returning an error.
    pub fn register(&mut self, flag: CommandFlag) -> &mut Self {
        let flag = Arc::new(flag);
        for alias in &flag.aliases {
            match self.by_alias.get(alias) {
                Some(existing) if **existing != *flag => {
                    panic!(
                        "flag alias [{alias}] already bound to [{}], refusing [{}]",
                        existing.name, flag.name
                    );
                }
                _ => {
                    self.by_alias.insert(alias.clone(), Arc::clone(&flag));
                }
            }
        }
        self
    }

    /// Validate raw flags against the registry, producing canonical values.
    ///
    /// Checks, in order per parsed flag: the name resolves; argument arity
    /// holds for the occurrence; no mutual-exclusion group is already claimed
    /// by a different flag. Occurrences of aliases merge into the canonical
    /// entry, and the single-argument rule is re-checked after the merge so
    /// an alias used twice cannot bypass it.
    pub fn validate(&self, parsed: &ParsedFlags) -> Result<FlagValues> {
        let mut claimed_groups: HashMap<&str, &CommandFlag> = HashMap::new();
        let mut values: HashMap<String, Vec<String>> = HashMap::new();

        for (spelling, args) in parsed.iter() {
            let flag = self
                .by_alias
                .get(spelling)
                .ok_or_else(|| CommandError::UnknownFlag(spelling.clone()))?;

            if !flag.accepts_arg && !args.is_empty() {
                return Err(CommandError::NoArgAllowed(flag.name.clone()));
            }
            if !flag.multi_arg && args.len() > 1 {
                return Err(CommandError::SingleArgOnly(flag.name.clone()));
            }

            for group in &flag.me_groups {
                match claimed_groups.get(group.as_str()) {
                    Some(occupant) if occupant.name != flag.name => {
                        return Err(CommandError::MutuallyExclusive {
                            a: flag.name.clone(),
                            b: occupant.name.clone(),
                            group: group.clone(),
                        });
                    }
                    _ => {
                        claimed_groups.insert(group.as_str(), flag.as_ref());
                    }
                }
            }

            let merged = values.entry(flag.name.clone()).or_default();
            merged.extend(args.iter().cloned());
            if !flag.multi_arg && merged.len() > 1 {
                return Err(CommandError::SingleArgOnly(flag.name.clone()));
            }
        }

        Ok(FlagValues(values))
    }
}
