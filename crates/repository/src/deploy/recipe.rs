//! Build recipe (Dockerfile) parsing.

/// One instruction, with line continuations joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub keyword: String,
    pub args: String,
    /// 1-based line where the instruction starts.
    pub line: usize,
}

/// Split a Dockerfile into instructions, skipping comments and blank lines.
pub fn parse(text: &str) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if pending.is_none() && (line.is_empty() || line.starts_with('#')) {
            continue;
        }

        let (start, mut buffer) = pending.take().unwrap_or((index + 1, String::new()));
        let (body, continues) = match line.strip_suffix('\\') {
            Some(body) => (body.trim_end(), true),
            None => (line, false),
        };
        if !buffer.is_empty() && !body.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(body);

        if continues {
            pending = Some((start, buffer));
        } else if let Some(instruction) = split_instruction(&buffer, start) {
            instructions.push(instruction);
        }
    }

    if let Some((start, buffer)) = pending {
        instructions.extend(split_instruction(&buffer, start));
    }
    instructions
}

fn split_instruction(text: &str, line: usize) -> Option<Instruction> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (keyword, args) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    Some(Instruction {
        keyword: keyword.to_ascii_uppercase(),
        args: args.trim().to_string(),
        line,
    })
}

/// Source paths of a `COPY`, without flags such as `--from=builder`.
pub fn copy_sources(instruction: &Instruction) -> Vec<&str> {
    let parts: Vec<&str> = instruction
        .args
        .split_whitespace()
        .filter(|part| !part.starts_with("--"))
        .collect();
    match parts.split_last() {
        Some((_, sources)) => sources.to_vec(),
        None => Vec::new(),
    }
}

/// Whether a `COPY` takes files from another build stage.
pub fn is_stage_copy(instruction: &Instruction) -> bool {
    instruction
        .args
        .split_whitespace()
        .any(|part| part.starts_with("--from="))
}
