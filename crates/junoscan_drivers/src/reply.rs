use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("invalid xml: {0}")]
    Xml(String),
    #[error("unclosed element <{0}>")]
    Unclosed(String),
    #[error("reply has no '{0}' element")]
    MissingField(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyNode {
    pub name: String,
    pub text: String,
    pub children: Vec<ReplyNode>,
}

impl ReplyNode {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&ReplyNode> {
        self.children.iter().find(|child| child.name == name)
    }

    fn descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a ReplyNode>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.descendants(name, found);
        }
    }
}

/// NETCONF reply as an element tree. Element names are stored without their
/// namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReply {
    root: ReplyNode,
}

impl DeviceReply {
    pub fn parse(xml: &str) -> Result<DeviceReply, ReplyError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack = vec![ReplyNode::new(String::new())];
        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                    stack.push(ReplyNode::new(name));
                }
                Ok(Event::Empty(empty)) => {
                    let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(ReplyNode::new(name));
                    }
                }
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return Err(ReplyError::Xml("unexpected closing tag".into()));
                    }
                    if let Some(node) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(node);
                        }
                    }
                }
                Ok(Event::Text(text)) => {
                    let text = text
                        .unescape()
                        .map_err(|err| ReplyError::Xml(err.to_string()))?;
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(text.trim());
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(node) = stack.last_mut() {
                        node.text
                            .push_str(String::from_utf8_lossy(&data.into_inner()).trim());
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(ReplyError::Xml(err.to_string())),
            }
        }

        if stack.len() > 1 {
            let open = stack.pop().map(|node| node.name).unwrap_or_default();
            return Err(ReplyError::Unclosed(open));
        }
        let root = stack
            .pop()
            .ok_or_else(|| ReplyError::Xml("empty document".into()))?;
        if root.children.is_empty() {
            return Err(ReplyError::Xml("no elements in reply".into()));
        }
        Ok(DeviceReply { root })
    }

    /// Resolves `a/b/c`: `a` may sit anywhere in the reply, `b` and `c` must be
    /// direct children. The first `a` for which the rest resolves wins.
    pub fn find(&self, path: &str) -> Option<&ReplyNode> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let mut anchors = Vec::new();
        self.root.descendants(first, &mut anchors);
        anchors.into_iter().find_map(|anchor| {
            rest.iter()
                .try_fold(anchor, |node, segment| node.child(segment))
        })
    }

    pub fn leaf(&self, path: &str) -> Result<&str, ReplyError> {
        self.find(path)
            .map(|node| node.text.as_str())
            .ok_or_else(|| ReplyError::MissingField(path.to_string()))
    }

    /// First `<rpc-error>` of severity `error`, if any. Warnings are ignored.
    pub fn rpc_error(&self) -> Option<String> {
        let mut errors = Vec::new();
        self.root.descendants("rpc-error", &mut errors);
        errors
            .into_iter()
            .find(|err| {
                err.child("error-severity")
                    .map(|severity| severity.text != "warning")
                    .unwrap_or(true)
            })
            .map(|err| {
                err.child("error-message")
                    .map(|message| message.text.clone())
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| "unspecified rpc-error".into())
            })
    }
}
