//! Bounded pre-scan of source nesting.
//!
//! Parsing, lowering and evaluation all recurse on the shape of the source,
//! so the depth is measured here with an explicit stack before any of them
//! run. The scan follows brackets, template literals and JSX tags closely
//! enough that JSX child text and string contents do not count.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// Code closed by the given bracket.
    Code(u8),
    /// Literal text between backticks.
    Template,
    /// Attributes of an opening tag.
    Tag,
    /// Children of an element or fragment.
    Children,
}

/// Byte offset at which nesting first goes deeper than `max_depth`.
pub(crate) fn exceeds(text: &str, max_depth: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut stack: Vec<Frame> = Vec::new();
    let mut previous = Previous::Start;
    let mut index = 0;

    while index < bytes.len() {
        let (step, opened) = match stack.last().copied() {
            None | Some(Frame::Code(_)) => code(bytes, index, &mut stack, &mut previous),
            Some(Frame::Template) => template(bytes, index, &mut stack, &mut previous),
            Some(Frame::Tag) => tag(bytes, index, &mut stack, &mut previous),
            Some(Frame::Children) => children(bytes, index, &mut stack, &mut previous),
        };
        if opened && stack.len() > max_depth {
            return Some(index);
        }
        index += step.max(1);
    }
    None
}

fn template(bytes: &[u8], index: usize, stack: &mut Vec<Frame>, previous: &mut Previous) -> (usize, bool) {
    match (bytes[index], bytes.get(index + 1).copied()) {
        (b'\\', _) => (2, false),
        (b'`', _) => {
            stack.pop();
            *previous = Previous::Operand;
            (1, false)
        }
        (b'$', Some(b'{')) => {
            stack.push(Frame::Code(b'}'));
            *previous = Previous::Start;
            (2, true)
        }
        _ => (1, false),
    }
}

fn tag(bytes: &[u8], index: usize, stack: &mut Vec<Frame>, previous: &mut Previous) -> (usize, bool) {
    match (bytes[index], bytes.get(index + 1).copied()) {
        (b'"' | b'\'', _) => (skip_string(bytes, index) - index, false),
        (b'{', _) => {
            stack.push(Frame::Code(b'}'));
            *previous = Previous::Start;
            (1, true)
        }
        (b'/', Some(b'>')) => {
            stack.pop();
            *previous = Previous::Operand;
            (2, false)
        }
        (b'>', _) => {
            if let Some(top) = stack.last_mut() {
                *top = Frame::Children;
            }
            (1, false)
        }
        _ => (1, false),
    }
}

fn children(bytes: &[u8], index: usize, stack: &mut Vec<Frame>, previous: &mut Previous) -> (usize, bool) {
    match (bytes[index], bytes.get(index + 1).copied()) {
        (b'{', _) => {
            stack.push(Frame::Code(b'}'));
            *previous = Previous::Start;
            (1, true)
        }
        (b'<', Some(b'/')) => {
            stack.pop();
            *previous = Previous::Operand;
            let step = bytes[index..]
                .iter()
                .position(|&byte| byte == b'>')
                .map_or(bytes.len() - index, |end| end + 1);
            (step, false)
        }
        (b'<', Some(b'>')) => {
            stack.push(Frame::Children);
            (2, true)
        }
        (b'<', _) => {
            stack.push(Frame::Tag);
            (1, true)
        }
        _ => (1, false),
    }
}

/// What the last significant code token was, to tell `<` as a tag apart
/// from `<` as an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Previous {
    Start,
    Operator,
    Operand,
}

const EXPRESSION_KEYWORDS: &[&str] = &[
    "return", "default", "yield", "await", "case", "else", "do", "in", "of", "typeof", "void",
];

/// One step in code context. Returns the bytes consumed and whether a frame
/// was pushed.
fn code(bytes: &[u8], index: usize, stack: &mut Vec<Frame>, previous: &mut Previous) -> (usize, bool) {
    let byte = bytes[index];
    let next = bytes.get(index + 1).copied();
    match byte {
        b'/' if next == Some(b'/') => {
            let end = bytes[index..]
                .iter()
                .position(|&byte| byte == b'\n')
                .map_or(bytes.len(), |end| index + end);
            (end - index, false)
        }
        b'/' if next == Some(b'*') => {
            let end = bytes[index + 2..]
                .windows(2)
                .position(|pair| pair == b"*/")
                .map_or(bytes.len(), |end| index + 2 + end + 2);
            (end - index, false)
        }
        b'"' | b'\'' => {
            *previous = Previous::Operand;
            (skip_string(bytes, index) - index, false)
        }
        b'`' => {
            stack.push(Frame::Template);
            (1, true)
        }
        b'\\' => (2.min(bytes.len() - index), false),
        b'(' | b'[' | b'{' => {
            let close = match byte {
                b'(' => b')',
                b'[' => b']',
                _ => b'}',
            };
            stack.push(Frame::Code(close));
            *previous = Previous::Start;
            (1, true)
        }
        b')' | b']' | b'}' => {
            if stack.last() == Some(&Frame::Code(byte)) {
                stack.pop();
            }
            *previous = Previous::Operand;
            (1, false)
        }
        b'<' if *previous != Previous::Operand
            && next.is_some_and(|next| next == b'>' || next.is_ascii_alphabetic() || next == b'_' || next == b'$') =>
        {
            if next == Some(b'>') {
                stack.push(Frame::Children);
                (2, true)
            } else {
                stack.push(Frame::Tag);
                (1, true)
            }
        }
        _ if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' => {
            let length = bytes[index..]
                .iter()
                .position(|&byte| !(byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'))
                .unwrap_or(bytes.len() - index);
            let word = &bytes[index..index + length];
            *previous = if EXPRESSION_KEYWORDS.iter().any(|keyword| keyword.as_bytes() == word) {
                Previous::Operator
            } else {
                Previous::Operand
            };
            (length, false)
        }
        _ if byte.is_ascii_whitespace() => (1, false),
        _ => {
            *previous = Previous::Operator;
            (1, false)
        }
    }
}

/// Index just past the string literal starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut index = start + 1;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 2,
            byte if byte == quote => return index + 1,
            _ => index += 1,
        }
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(text: &str) -> usize {
        (0..64).find(|&limit| exceeds(text, limit).is_none()).unwrap_or(64)
    }

    #[test]
    fn brackets_nest() {
        assert_eq!(depth("f(a[0], { b: 1 })"), 2);
        assert_eq!(depth("((((1))))"), 4);
        assert_eq!(depth("const x = 1;"), 0);
    }

    #[test]
    fn elements_nest_with_their_expressions() {
        assert_eq!(depth("<div><span>{x}</span></div>"), 3);
        assert_eq!(depth("<><br /><img src={a} /></>"), 3);
        assert_eq!(depth("return <ul>{items.map((i) => <li key={i}>{i}</li>)}</ul>;"), 5);
    }

    #[test]
    fn text_and_literals_do_not_count() {
        assert_eq!(depth("<p>((( :) [[</p>"), 1);
        assert_eq!(depth("const s = '((({'; // (((\n/* [[[ */"), 0);
        assert_eq!(depth("`a ${b} (`"), 2);
        assert_eq!(depth("<a title=\"{{{\" />"), 1);
    }

    #[test]
    fn comparisons_are_not_tags() {
        assert_eq!(depth("if (a <b) { x = c<d; }"), 1);
        assert_eq!(depth("for (let i = 0; i < n; i++) {}"), 1);
    }

    #[test]
    fn reports_the_first_offending_offset() {
        assert_eq!(exceeds("((()))", 2), Some(2));
        assert_eq!(exceeds("<a><b><c/></b></a>", 2), Some(6));
        assert_eq!(exceeds("<a><b/></a>", 2), None);
    }
}
