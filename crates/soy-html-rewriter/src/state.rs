//! The tag-lexing state machine's states.

use soy_ast::ContentKind;

/// Where the scanner is within the HTML grammar.
///
/// Two traits matter at block boundaries: [`in_tag`](State::in_tag) states
/// are inside a tag but outside any attribute value, and states with
/// [`invalid_end_of_block`](State::invalid_end_of_block) may not be the
/// last thing a block does (an attribute name with `=` but no value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Content the rewriter does not touch (`text`, `css`, `js`, …).
    None,
    /// Ordinary HTML character data.
    Pcdata,
    /// Inside `<script>` content.
    RcdataScript,
    /// Inside `<style>` content.
    RcdataStyle,
    /// Inside `<title>` content.
    RcdataTitle,
    /// Inside `<textarea>` content.
    RcdataTextarea,
    /// Inside `<!-- … -->`.
    HtmlComment,
    /// Inside `<![CDATA[ … ]]>`.
    Cdata,
    /// Inside `<!…>` or `<?…>`.
    XmlDeclaration,
    /// Single-quoted value inside an XML declaration.
    SingleQuotedXmlAttrValue,
    /// Double-quoted value inside an XML declaration.
    DoubleQuotedXmlAttrValue,
    /// Consuming a tag name (just past `<` or `</`).
    HtmlTagName,
    /// Just past an attribute name, before `=` or the next attribute.
    AfterAttributeName,
    /// Just past `=`, before the value.
    BeforeAttributeValue,
    /// Inside a `'…'` attribute value.
    SingleQuotedAttrValue,
    /// Inside a `"…"` attribute value.
    DoubleQuotedAttrValue,
    /// Inside an unquoted attribute value.
    UnquotedAttrValue,
    /// Just past a tag name or a completed attribute, no whitespace yet.
    AfterTagNameOrAttribute,
    /// Whitespace seen; an attribute name (or tag close) may start.
    BeforeAttributeName,
}

impl State {
    /// The starting state for a template or content block of `kind`.
    pub fn for_content_kind(kind: ContentKind) -> State {
        match kind {
            ContentKind::Html => State::Pcdata,
            ContentKind::Attributes => State::BeforeAttributeName,
            _ => State::None,
        }
    }

    /// Inside a tag, outside any attribute value.
    pub fn in_tag(self) -> bool {
        matches!(
            self,
            State::AfterAttributeName
                | State::AfterTagNameOrAttribute
                | State::BeforeAttributeName
        )
    }

    /// A block may not end here.
    pub fn invalid_end_of_block(self) -> bool {
        matches!(self, State::BeforeAttributeValue)
    }

    /// One of the three attribute-value states.
    pub fn is_attr_value(self) -> bool {
        matches!(
            self,
            State::SingleQuotedAttrValue
                | State::DoubleQuotedAttrValue
                | State::UnquotedAttrValue
        )
    }

    /// One of the four rcdata states.
    pub fn is_rcdata(self) -> bool {
        matches!(
            self,
            State::RcdataScript
                | State::RcdataStyle
                | State::RcdataTitle
                | State::RcdataTextarea
        )
    }

    /// Text-like states where commands may sit without restructuring.
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            State::None
                | State::Pcdata
                | State::HtmlComment
                | State::Cdata
                | State::XmlDeclaration
                | State::SingleQuotedXmlAttrValue
                | State::DoubleQuotedXmlAttrValue
        ) || self.is_rcdata()
    }

    /// Computes the least upper bound of two branch ending states, or
    /// `None` when the branches leave HTML parsing ambiguous.
    pub fn reconcile(self, other: State) -> Option<State> {
        if self == other {
            return Some(self);
        }
        if self.in_tag() && other.in_tag() {
            return Some(State::AfterTagNameOrAttribute);
        }
        // an attribute value may be supplied by one branch and not the
        // other; the construct's owner decides whether that is exhaustive
        let value_done = |s: State| {
            matches!(
                s,
                State::UnquotedAttrValue
                    | State::AfterTagNameOrAttribute
                    | State::BeforeAttributeName
            )
        };
        if self == State::BeforeAttributeValue && value_done(other) {
            return Some(other);
        }
        if other == State::BeforeAttributeValue && value_done(self) {
            return Some(self);
        }
        None
    }

    /// A stable lowercase name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            State::None => "none",
            State::Pcdata => "pcdata",
            State::RcdataScript => "script content",
            State::RcdataStyle => "style content",
            State::RcdataTitle => "title content",
            State::RcdataTextarea => "textarea content",
            State::HtmlComment => "html comment",
            State::Cdata => "cdata",
            State::XmlDeclaration => "xml declaration",
            State::SingleQuotedXmlAttrValue => "single-quoted xml attribute value",
            State::DoubleQuotedXmlAttrValue => "double-quoted xml attribute value",
            State::HtmlTagName => "html tag name",
            State::AfterAttributeName => "after an attribute name",
            State::BeforeAttributeValue => "before an attribute value",
            State::SingleQuotedAttrValue => "single-quoted attribute value",
            State::DoubleQuotedAttrValue => "double-quoted attribute value",
            State::UnquotedAttrValue => "unquoted attribute value",
            State::AfterTagNameOrAttribute => "after a tag name or attribute",
            State::BeforeAttributeName => "before an attribute name",
        }
    }

    /// A follow-up hint for `BLOCK_CHANGES_CONTEXT`, keyed on the ending
    /// state that failed to reconcile.
    pub fn end_of_block_hint(self) -> &'static str {
        match self {
            State::SingleQuotedAttrValue | State::DoubleQuotedAttrValue => {
                " Did you forget to close the attribute value?"
            }
            State::UnquotedAttrValue | State::BeforeAttributeValue => {
                " Did you forget the attribute value?"
            }
            State::HtmlComment => " Did you forget to close the comment?",
            State::Cdata => " Did you forget to close the CDATA section?",
            s if s.in_tag() || s == State::HtmlTagName => " Did you forget to close the tag?",
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traits_match_the_state_table() {
        assert!(State::AfterAttributeName.in_tag());
        assert!(State::AfterTagNameOrAttribute.in_tag());
        assert!(State::BeforeAttributeName.in_tag());
        assert!(!State::BeforeAttributeValue.in_tag());
        assert!(!State::UnquotedAttrValue.in_tag());

        assert!(State::BeforeAttributeValue.invalid_end_of_block());
        assert!(!State::Pcdata.invalid_end_of_block());
    }

    #[test]
    fn reconcile_equal_states() {
        assert_eq!(State::Pcdata.reconcile(State::Pcdata), Some(State::Pcdata));
    }

    #[test]
    fn reconcile_tag_states_to_after_tag_name_or_attribute() {
        assert_eq!(
            State::BeforeAttributeName.reconcile(State::AfterAttributeName),
            Some(State::AfterTagNameOrAttribute)
        );
    }

    #[test]
    fn reconcile_before_attribute_value_special_case() {
        for done in [
            State::UnquotedAttrValue,
            State::AfterTagNameOrAttribute,
            State::BeforeAttributeName,
        ] {
            assert_eq!(State::BeforeAttributeValue.reconcile(done), Some(done));
            assert_eq!(done.reconcile(State::BeforeAttributeValue), Some(done));
        }
    }

    #[test]
    fn irreconcilable_states_fail() {
        assert_eq!(State::Pcdata.reconcile(State::AfterTagNameOrAttribute), None);
        assert_eq!(State::DoubleQuotedAttrValue.reconcile(State::Pcdata), None);
        assert_eq!(State::BeforeAttributeValue.reconcile(State::DoubleQuotedAttrValue), None);
    }

    #[test]
    fn initial_states_by_content_kind() {
        assert_eq!(State::for_content_kind(ContentKind::Html), State::Pcdata);
        assert_eq!(
            State::for_content_kind(ContentKind::Attributes),
            State::BeforeAttributeName
        );
        assert_eq!(State::for_content_kind(ContentKind::Js), State::None);
    }
}
